//! Shared fixtures for the integration scenarios: a scripted command
//! runner standing in for drush/composer, and in-memory fakes for the
//! panel collaborators.

#![allow(dead_code)]

use drush_webapp::{
    AppProfile, CommandRunner, DatabaseCredentials, DatabaseProvisioner, DrupalManager, Error,
    HardeningLevel, InstallOptions, InstallTracker, MailGateway, PasswordSource, RawOutput,
    Result, Services, SiteInfo, VersionFeed,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// One recorded subprocess invocation.
#[derive(Debug, Clone)]
pub struct Call {
    pub dir: PathBuf,
    pub program: String,
    pub args: Vec<String>,
}

type Effect = Box<dyn Fn(&Path) + Send + Sync>;

struct Rule {
    needle: String,
    /// `None` simulates a runner-level failure (spawn error, timeout).
    output: Option<RawOutput>,
    effect: Option<Effect>,
}

/// Command runner that answers from scripted rules instead of spawning
/// subprocesses.
///
/// The first rule whose needle appears in an argument (or the program
/// name) wins; unmatched commands succeed with empty output. Every
/// invocation is recorded in a log the test keeps a handle to.
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Script a response for commands matching `needle`.
    pub fn on(self, needle: &str, code: i32, stdout: &str, stderr: &str) -> Self {
        self.rule(needle, code, stdout, stderr, None)
    }

    /// Script a response plus a filesystem side effect, handed the
    /// command's working directory.
    pub fn on_with(
        self,
        needle: &str,
        code: i32,
        stdout: &str,
        stderr: &str,
        effect: impl Fn(&Path) + Send + Sync + 'static,
    ) -> Self {
        self.rule(needle, code, stdout, stderr, Some(Box::new(effect)))
    }

    /// Script a runner-level error (spawn failure, timeout) for commands
    /// matching `needle`.
    pub fn on_err(mut self, needle: &str) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            output: None,
            effect: None,
        });
        self
    }

    fn rule(
        mut self,
        needle: &str,
        code: i32,
        stdout: &str,
        stderr: &str,
        effect: Option<Effect>,
    ) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            output: Some(RawOutput {
                code: Some(code),
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            }),
            effect,
        });
        self
    }

    /// Handle to the invocation log, valid after the runner moves into a
    /// manager.
    pub fn log(&self) -> Arc<Mutex<Vec<Call>>> {
        self.calls.clone()
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, dir: &Path, program: &str, args: &[String]) -> Result<RawOutput> {
        self.calls
            .lock()
            .unwrap()
            .push(Call {
                dir: dir.to_path_buf(),
                program: program.to_string(),
                args: args.to_vec(),
            });
        for rule in &self.rules {
            if args.iter().any(|a| a.contains(&rule.needle)) || program.contains(&rule.needle) {
                if let Some(effect) = &rule.effect {
                    effect(dir);
                }
                return match &rule.output {
                    Some(output) => Ok(output.clone()),
                    None => Err(std::io::Error::new(
                        std::io::ErrorKind::BrokenPipe,
                        "subprocess unavailable",
                    )
                    .into()),
                };
            }
        }
        Ok(RawOutput {
            code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

/// Database provisioner recording creates and rollbacks.
#[derive(Default)]
pub struct FakeDb {
    pub disabled: bool,
    pub created: Mutex<Vec<DatabaseCredentials>>,
    pub rolled_back: Mutex<Vec<String>>,
}

impl DatabaseProvisioner for FakeDb {
    fn enabled(&self) -> bool {
        !self.disabled
    }

    fn create(&self, hostname: &str) -> Result<DatabaseCredentials> {
        let credentials = DatabaseCredentials {
            username: "dbuser".to_string(),
            password: "dbpass".to_string(),
            hostname: "localhost".to_string(),
            database: format!("{}_drupal", hostname.replace('.', "_")),
        };
        self.created.lock().unwrap().push(credentials.clone());
        Ok(credentials)
    }

    fn rollback(&self, credentials: &DatabaseCredentials) -> Result<()> {
        self.rolled_back
            .lock()
            .unwrap()
            .push(credentials.database.clone());
        Ok(())
    }
}

/// Mail gateway with a fixed transport list, recording created aliases.
#[derive(Default)]
pub struct FakeMail {
    pub transports: Vec<String>,
    pub aliases: Mutex<Vec<(String, String, String)>>,
}

impl MailGateway for FakeMail {
    fn address_exists(&self, _user: &str, _domain: &str) -> bool {
        false
    }

    fn transport_exists(&self, domain: &str) -> bool {
        self.transports.iter().any(|d| d == domain)
    }

    fn add_alias(&self, user: &str, domain: &str, forward_to: &str) -> Result<()> {
        self.aliases.lock().unwrap().push((
            user.to_string(),
            domain.to_string(),
            forward_to.to_string(),
        ));
        Ok(())
    }
}

/// Tracker recording persisted metadata and install notifications.
///
/// Notices capture the effective admin password so tests can check the
/// confirmation would carry usable credentials.
#[derive(Default)]
pub struct FakeTracker {
    pub level: Mutex<Option<HardeningLevel>>,
    pub infos: Mutex<Vec<(PathBuf, SiteInfo)>>,
    pub notices: Mutex<Vec<(String, String, Option<String>)>>,
}

impl InstallTracker for FakeTracker {
    fn set_info(&self, app_root: &Path, info: SiteInfo) {
        self.infos
            .lock()
            .unwrap()
            .push((app_root.to_path_buf(), info));
    }

    fn hardening_level(&self, _app_root: &Path) -> Option<HardeningLevel> {
        *self.level.lock().unwrap()
    }

    fn notify_installed(&self, hostname: &str, path: &str, options: &InstallOptions) {
        self.notices
            .lock()
            .unwrap()
            .push((hostname.to_string(), path.to_string(), options.password.clone()));
    }
}

pub struct FixedPasswords;

impl PasswordSource for FixedPasswords {
    fn generate(&self) -> String {
        "generated-secret".to_string()
    }
}

pub struct StaticFeed {
    pub versions: Vec<String>,
}

impl VersionFeed for StaticFeed {
    fn fetch(&self) -> Result<Vec<String>> {
        if self.versions.is_empty() {
            return Err(Error::command("release feed", "feed unavailable"));
        }
        Ok(self.versions.clone())
    }
}

/// A plain services bundle for tests that wire a manager by hand.
pub fn basic_services() -> Services {
    Services {
        database: Arc::new(FakeDb::default()),
        mail: Arc::new(FakeMail::default()),
        tracker: Arc::new(FakeTracker::default()),
        passwords: Arc::new(FixedPasswords),
        feed: Arc::new(StaticFeed {
            versions: Vec::new(),
        }),
    }
}

/// A manager wired to the fakes, plus handles to everything a test
/// asserts against.
pub struct Harness {
    pub webroot: TempDir,
    pub calls: Arc<Mutex<Vec<Call>>>,
    pub db: Arc<FakeDb>,
    pub mail: Arc<FakeMail>,
    pub tracker: Arc<FakeTracker>,
    pub manager: DrupalManager<ScriptedRunner>,
}

impl Harness {
    pub fn new(runner: ScriptedRunner) -> Self {
        Self::build(runner, FakeDb::default(), FakeMail::default(), &[])
    }

    pub fn with_feed(runner: ScriptedRunner, versions: &[&str]) -> Self {
        Self::build(runner, FakeDb::default(), FakeMail::default(), versions)
    }

    pub fn build(
        runner: ScriptedRunner,
        db: FakeDb,
        mail: FakeMail,
        versions: &[&str],
    ) -> Self {
        let webroot = tempfile::tempdir().unwrap();
        let calls = runner.log();
        let db = Arc::new(db);
        let mail = Arc::new(mail);
        let tracker = Arc::new(FakeTracker::default());
        let services = Services {
            database: db.clone(),
            mail: mail.clone(),
            tracker: tracker.clone(),
            passwords: Arc::new(FixedPasswords),
            feed: Arc::new(StaticFeed {
                versions: versions.iter().map(|v| v.to_string()).collect(),
            }),
        };
        let manager = DrupalManager::new(
            AppProfile::drupal(),
            webroot.path(),
            "example.com",
            runner,
            services,
        );
        Self {
            webroot,
            calls,
            db,
            mail,
            tracker,
            manager,
        }
    }

    /// Whether any recorded invocation carries `needle` in an argument.
    pub fn invoked(&self, needle: &str) -> bool {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.args.iter().any(|a| a.contains(needle)))
    }

    /// Arguments of the first invocation carrying `needle`.
    pub fn args_of(&self, needle: &str) -> Option<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.args.iter().any(|a| a.contains(needle)))
            .map(|c| c.args.clone())
    }

    /// Seed a minimal legacy install tree for the hostname.
    pub fn seed_legacy_site(&self, hostname: &str) -> PathBuf {
        let doc_root = self.webroot.path().join(hostname);
        std::fs::create_dir_all(doc_root.join("sites/default")).unwrap();
        doc_root
    }
}
