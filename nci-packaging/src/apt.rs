// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Planning of `apt-get`, `apt-key` and `add-apt-repository` invocations.

Commands are an explicit enumeration. Anything not covered goes through the
`Raw` variants, which take the operation and arguments verbatim.

Nothing in here spawns processes. [AptContext] turns commands into a sequence of
[Invocation] values that a caller can execute however it likes. The context
owns the state that decides whether an implicit `apt-get update` is due and
whether `add-apt-repository` still has to be installed.
*/

use {
    chrono::{DateTime, Duration, Utc},
    log::warn,
    std::fmt::{Display, Formatter},
};

/// Seconds after which the package lists count as stale.
pub const UPDATE_INTERVAL_SECONDS: i64 = 5 * 60;

/// Package providing `add-apt-repository`.
const ADD_APT_REPOSITORY_PACKAGE: &str = "software-properties-common";

/// Arguments injected into every `apt-get` call.
const APT_DEFAULT_ARGS: &[&str] = &[
    "-y",
    "-o",
    "APT::Get::force-yes=true",
    "-o",
    "Debug::pkgProblemResolver=true",
];

/// A single process execution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl ToString, args: impl IntoIterator<Item = impl ToString>) -> Self {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(|x| x.to_string()).collect(),
        }
    }
}

impl Display for Invocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }

        Ok(())
    }
}

/// An `apt-get` operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AptCommand {
    Update,
    Install(Vec<String>),
    DistUpgrade,
    Purge(Vec<String>),
    Autoremove,
    /// Any other operation, e.g. `build-dep`, with its operands.
    Raw { operation: String, args: Vec<String> },
}

impl AptCommand {
    pub fn install(packages: impl IntoIterator<Item = impl ToString>) -> Self {
        Self::Install(packages.into_iter().map(|x| x.to_string()).collect())
    }

    pub fn purge(packages: impl IntoIterator<Item = impl ToString>) -> Self {
        Self::Purge(packages.into_iter().map(|x| x.to_string()).collect())
    }

    /// Map an operation word and its operands onto a command.
    ///
    /// Operations without a dedicated variant become [AptCommand::Raw]. Operands
    /// of operations that take none are dropped.
    pub fn from_operation(
        operation: &str,
        operands: impl IntoIterator<Item = impl ToString>,
    ) -> Self {
        match operation {
            "update" => Self::Update,
            "install" => Self::install(operands),
            "dist-upgrade" => Self::DistUpgrade,
            "purge" => Self::purge(operands),
            "autoremove" => Self::Autoremove,
            _ => Self::Raw {
                operation: operation.to_string(),
                args: operands.into_iter().map(|x| x.to_string()).collect(),
            },
        }
    }

    /// The operation word passed to `apt-get`.
    pub fn operation(&self) -> &str {
        match self {
            Self::Update => "update",
            Self::Install(_) => "install",
            Self::DistUpgrade => "dist-upgrade",
            Self::Purge(_) => "purge",
            Self::Autoremove => "autoremove",
            Self::Raw { operation, .. } => operation,
        }
    }

    fn operands(&self) -> &[String] {
        match self {
            Self::Install(packages) | Self::Purge(packages) => packages,
            Self::Raw { args, .. } => args,
            Self::Update | Self::DistUpgrade | Self::Autoremove => &[],
        }
    }

    fn is_update(&self) -> bool {
        self.operation() == "update"
    }

    /// The `apt-get` invocation for this command.
    ///
    /// `extra_args` are placed after the default arguments and before the operation.
    pub fn invocation(&self, extra_args: &[String]) -> Invocation {
        let args = APT_DEFAULT_ARGS
            .iter()
            .map(|x| x.to_string())
            .chain(extra_args.iter().cloned())
            .chain(std::iter::once(self.operation().to_string()))
            .chain(self.operands().iter().cloned())
            .collect::<Vec<_>>();

        Invocation {
            program: "apt-get".to_string(),
            args,
        }
    }
}

/// An `apt-key` operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AptKeyCommand {
    /// Add a key from a file (or `-` for stdin).
    Add(String),
    Adv(Vec<String>),
    Raw { operation: String, args: Vec<String> },
}

impl AptKeyCommand {
    pub fn invocation(&self) -> Invocation {
        let args = match self {
            Self::Add(path) => vec!["add".to_string(), path.clone()],
            Self::Adv(args) => std::iter::once("adv".to_string())
                .chain(args.iter().cloned())
                .collect(),
            Self::Raw { operation, args } => std::iter::once(operation.clone())
                .chain(args.iter().cloned())
                .collect(),
        };

        Invocation {
            program: "apt-key".to_string(),
            args,
        }
    }
}

/// Adding or removing an entry in the apt sources via `add-apt-repository`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RepositoryCommand {
    Add(String),
    Remove(String),
}

impl RepositoryCommand {
    pub fn invocation(&self) -> Invocation {
        match self {
            Self::Add(name) => Invocation::new("add-apt-repository", ["-y", name.as_str()]),
            Self::Remove(name) => {
                Invocation::new("add-apt-repository", ["-y", "-r", name.as_str()])
            }
        }
    }
}

/// Whether package lists last refreshed at `last_update` are stale at `now`.
///
/// Never having updated counts as stale.
pub fn update_is_due(last_update: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_update {
        None => true,
        Some(last) => now - last >= Duration::seconds(UPDATE_INTERVAL_SECONDS),
    }
}

/// State carried between apt operations of one run.
#[derive(Clone, Debug, Default)]
pub struct AptContext {
    last_update: Option<DateTime<Utc>>,
    add_apt_repository_installed: bool,
}

impl AptContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// When package lists were last refreshed through this context.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn needs_update(&self, now: DateTime<Utc>) -> bool {
        update_is_due(self.last_update, now)
    }

    /// Forget all cached state.
    ///
    /// The next command will update first and repository changes will install
    /// `add-apt-repository` again.
    pub fn invalidate(&mut self) {
        self.last_update = None;
        self.add_apt_repository_installed = false;
    }

    /// Plan an `apt-get` command at time `now`.
    ///
    /// A stale context gets an `update` scheduled before the command. Planning an
    /// `update` (implicit or explicit) marks the lists as fresh.
    pub fn plan(
        &mut self,
        command: &AptCommand,
        extra_args: &[String],
        now: DateTime<Utc>,
    ) -> Vec<Invocation> {
        let mut res = vec![];

        if command.is_update() {
            self.last_update = Some(now);
        } else if self.needs_update(now) {
            res.push(AptCommand::Update.invocation(&[]));
            self.last_update = Some(now);
        }

        let invocation = command.invocation(extra_args);
        warn!("APT run ({})", invocation);
        res.push(invocation);

        res
    }

    /// Plan an `add-apt-repository` call, installing the tool first if this context
    /// has not done so yet.
    pub fn plan_repository(
        &mut self,
        command: &RepositoryCommand,
        now: DateTime<Utc>,
    ) -> Vec<Invocation> {
        let mut res = vec![];

        if !self.add_apt_repository_installed {
            res.extend(self.plan(
                &AptCommand::install([ADD_APT_REPOSITORY_PACKAGE]),
                &[],
                now,
            ));
            self.add_apt_repository_installed = true;
        }

        res.push(command.invocation());

        res
    }
}
