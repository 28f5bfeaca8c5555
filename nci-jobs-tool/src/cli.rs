// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    clap::{Arg, ArgMatches, Command},
    log::{info, warn, LevelFilter},
    nci_jobs::{axes::Axes, error::JobsError, job::JobDescriptor, project::ProjectSet},
    nci_packaging::{
        appstream,
        apt::{AptCommand, AptContext, RepositoryCommand},
        error::PackagingError,
        version_check::{
            latest_versions, parse_override_packages, Package, PackageUpgradeVersionCheck,
            PackageVersionCheck, TheirVersions, VersionReport,
        },
    },
    std::{
        collections::BTreeSet,
        path::{Path, PathBuf},
    },
    thiserror::Error,
};

const GENERATE_ABOUT: &str = "\
Generate the CI job graph.

Reads the axes of the build matrix from a YAML file and the projects of every
release type from `<projects-dir>/<type>.yaml`, expands the matrix, wires the
triggers between jobs and prints the resulting job list.

# Axes

series (required) (list[string])
   Series of the base distribution, oldest first.

current_series (required) (string)
   The series users are on.

old_series (optional) (string)
   Legacy series. Jobs are generated but never triggered by the daily cycle.

future_series (optional) (string)
   The upcoming series.

future_is_early (optional) (bool)
   While true the future series only gets unstable images.

types (required) (list[string])
   Release types, e.g. unstable, stable, release, experimental.

qt_stage_type (optional) (string)
   Type staging Qt. It gets builds but no aggregation.

architectures (required) (list[string])
   Standard architectures.

extra_architectures (optional) (list[string])
   Secondary architectures. Only unstable, stable, release and experimental
   build on these.

# Output

The job list is printed in generation order. Every job carries its key, its
kind with the parameters needed to render it, and its upstream and downstream
triggers.

Projects left out of a series by their configuration are reported as warnings.
Any configuration error aborts without output.
";

const CHECK_VERSIONS_ABOUT: &str = "\
Check package versions against what apt offers.

The package list is a YAML list of `name` and `version` mappings. The policy
file holds the output of `apt-cache policy` for those packages.

By default every package must be newer than the apt candidate. With
--upgrade every package must instead be older than what the future series
offers: the higher of the apt candidate and the version listed in --future.
Debug symbol packages and packages pinned in --overrides are not checked in
that mode.
";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("argument parsing error: {0:?}")]
    Clap(#[from] clap::Error),

    #[error("{0}")]
    Jobs(#[from] JobsError),

    #[error("{0}")]
    Packaging(#[from] PackagingError),

    #[error("I/O error on path {0}: {1:?}")]
    IoPath(String, std::io::Error),

    #[error("JSON error: {0:?}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("YAML error: {0:?}")]
    SerdeYaml(#[from] serde_yaml::Error),

    #[error("required argument missing: {0}")]
    MissingArgument(&'static str),

    #[error("unknown output format: {0}")]
    UnknownFormat(String),

    #[error("{0} package version checks failed")]
    VersionChecksFailed(usize),

    #[error("invalid sub-command: {0}")]
    InvalidSubCommand(String),
}

pub type Result<T> = std::result::Result<T, ToolError>;

fn path_arg(args: &ArgMatches, name: &'static str) -> Result<PathBuf> {
    args.value_of_os(name)
        .map(PathBuf::from)
        .ok_or(ToolError::MissingArgument(name))
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| ToolError::IoPath(format!("{}", path.display()), e))
}

fn path_option(name: &'static str, long: &'static str, help: &'static str) -> Arg<'static> {
    Arg::new(name)
        .long(long)
        .takes_value(true)
        .allow_invalid_utf8(true)
        .help(help)
}

pub fn run_cli() -> Result<()> {
    let app = Command::new("neon CI job tool")
        .version(env!("CARGO_PKG_VERSION"))
        .author("KDE neon CI <neon@kde.org>")
        .about("Generate and lint the neon CI")
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .multiple_occurrences(true)
                .help("Increase logging verbosity. Can be specified multiple times."),
        );

    let app = app.subcommand(
        Command::new("generate")
            .about("Generate the CI job graph")
            .long_about(GENERATE_ABOUT)
            .arg(
                path_option("axes", "axes", "Path to the YAML file declaring the matrix")
                    .required(true),
            )
            .arg(
                path_option(
                    "projects-dir",
                    "projects-dir",
                    "Directory holding one <type>.yaml projects file per release type",
                )
                .required(true),
            )
            .arg(
                Arg::new("format")
                    .long("format")
                    .takes_value(true)
                    .possible_values(["yaml", "json"])
                    .default_value("yaml")
                    .help("Output format of the job list"),
            ),
    );

    let app = app.subcommand(
        Command::new("check-versions")
            .about("Check package versions against apt")
            .long_about(CHECK_VERSIONS_ABOUT)
            .arg(
                path_option("packages", "packages", "YAML list of our packages").required(true),
            )
            .arg(
                path_option("policy", "policy", "Output of apt-cache policy for the packages")
                    .required(true),
            )
            .arg(
                Arg::new("upgrade")
                    .long("upgrade")
                    .help("Check that versions stay below the future series"),
            )
            .arg(
                path_option("future", "future", "YAML list of future series packages")
                    .requires("upgrade"),
            )
            .arg(
                path_option("overrides", "overrides", "apt preferences file of pinned packages")
                    .requires("upgrade"),
            ),
    );

    let app = app.subcommand(
        Command::new("appstream-filter")
            .about("Update the exclusion list of base distribution appstream components")
            .arg(
                path_option(
                    "dir",
                    "dir",
                    "Directory holding removed-components.json",
                )
                .required(true),
            )
            .arg(
                path_option(
                    "search-output",
                    "search-output",
                    "Output of appstreamcli search for the base distribution",
                )
                .required(true),
            ),
    );

    let mut app = app.subcommand(
        Command::new("apt-plan")
            .about("Print the apt-get invocations an operation expands to")
            .arg(
                Arg::new("operation")
                    .required(true)
                    .help("apt-get operation, e.g. install or build-dep"),
            )
            .arg(
                Arg::new("operands")
                    .multiple_values(true)
                    .help("Operands of the operation"),
            )
            .arg(
                Arg::new("extra-arg")
                    .long("extra-arg")
                    .takes_value(true)
                    .multiple_occurrences(true)
                    .allow_hyphen_values(true)
                    .help("Extra argument to pass to apt-get"),
            )
            .arg(
                Arg::new("add-repository")
                    .long("add-repository")
                    .takes_value(true)
                    .help("Add a repository before running the operation"),
            ),
    );

    let matches = app.clone().get_matches();

    let log_level = match matches.occurrences_of("verbose") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    // Disable log context except at higher log levels.
    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    builder.init();

    match matches.subcommand() {
        Some(("generate", args)) => command_generate(args),
        Some(("check-versions", args)) => command_check_versions(args),
        Some(("appstream-filter", args)) => command_appstream_filter(args),
        Some(("apt-plan", args)) => command_apt_plan(args),
        Some((command, _)) => Err(ToolError::InvalidSubCommand(command.to_string())),
        None => {
            app.print_help()
                .map_err(|e| ToolError::IoPath("stdout".into(), e))?;
            Ok(())
        }
    }
}

/// Generate, wire and serialize the job list.
fn generate(axes_path: &Path, projects_dir: &Path, format: &str) -> Result<String> {
    let axes = Axes::from_path(axes_path)?;
    let projects = ProjectSet::load_dir(projects_dir, &axes)?;

    let generation = nci_jobs::generate(&axes, &projects)?;

    if !generation.skips.is_empty() {
        warn!(
            "{} project/series combinations skipped by configuration",
            generation.skips.len()
        );
    }

    let jobs = generation.registry.all().iter().collect::<Vec<&JobDescriptor>>();

    match format {
        "yaml" => Ok(serde_yaml::to_string(&jobs)?),
        "json" => Ok(serde_json::to_string_pretty(&jobs)?),
        _ => Err(ToolError::UnknownFormat(format.to_string())),
    }
}

fn command_generate(args: &ArgMatches) -> Result<()> {
    let axes_path = path_arg(args, "axes")?;
    let projects_dir = path_arg(args, "projects-dir")?;
    let format = args.value_of("format").unwrap_or("yaml");

    println!("{}", generate(&axes_path, &projects_dir, format)?);

    Ok(())
}

fn load_packages(path: &Path) -> Result<Vec<Package>> {
    Ok(serde_yaml::from_str(&read_file(path)?)?)
}

/// Inputs of the version checks.
struct VersionCheckInput {
    packages: Vec<Package>,
    theirs: TheirVersions,
    /// Present in upgrade mode.
    future: Option<Vec<Package>>,
    overrides: BTreeSet<String>,
}

fn check_versions(input: &VersionCheckInput) -> Result<VersionReport> {
    Ok(match &input.future {
        Some(future) => {
            let future = latest_versions(future)?;
            let check = PackageUpgradeVersionCheck::new(&input.theirs, &future, &input.overrides);
            VersionReport::run(&input.packages, &check)
        }
        None => {
            let check = PackageVersionCheck::new(&input.theirs);
            VersionReport::run(&input.packages, &check)
        }
    })
}

fn command_check_versions(args: &ArgMatches) -> Result<()> {
    let packages = load_packages(&path_arg(args, "packages")?)?;
    let theirs = TheirVersions::from_apt_cache_policy(&read_file(&path_arg(args, "policy")?)?)?;

    let (future, overrides) = if args.is_present("upgrade") {
        let future = match args.value_of_os("future") {
            Some(path) => load_packages(Path::new(path))?,
            None => vec![],
        };
        let overrides = match args.value_of_os("overrides") {
            Some(path) => parse_override_packages(&read_file(Path::new(path))?),
            None => BTreeSet::new(),
        };

        (Some(future), overrides)
    } else {
        (None, BTreeSet::new())
    };

    let report = check_versions(&VersionCheckInput {
        packages,
        theirs,
        future,
        overrides,
    })?;

    for (package, res) in report.outcomes() {
        match res {
            Ok(()) => println!("ok {}", package.check_name()),
            Err(err) => println!("FAIL {}: {}", package.check_name(), err),
        }
    }

    match report.failures().count() {
        0 => Ok(()),
        count => Err(ToolError::VersionChecksFailed(count)),
    }
}

fn command_appstream_filter(args: &ArgMatches) -> Result<()> {
    let dir = path_arg(args, "dir")?;
    let search_output = read_file(&path_arg(args, "search-output")?)?;

    let res = appstream::apply_to_dir(&dir, &search_output)?;
    info!(
        "{} components removed, {} of them automatically",
        res.removed.len(),
        res.auto.len()
    );

    Ok(())
}

fn command_apt_plan(args: &ArgMatches) -> Result<()> {
    let operation = args
        .value_of("operation")
        .ok_or(ToolError::MissingArgument("operation"))?;
    let operands = args
        .values_of("operands")
        .map(|x| x.collect::<Vec<_>>())
        .unwrap_or_default();
    let extra_args = args
        .values_of("extra-arg")
        .map(|x| x.map(|x| x.to_string()).collect::<Vec<_>>())
        .unwrap_or_default();

    let now = chrono::Utc::now();
    let mut context = AptContext::new();
    let mut invocations = vec![];

    if let Some(repository) = args.value_of("add-repository") {
        invocations.extend(
            context.plan_repository(&RepositoryCommand::Add(repository.to_string()), now),
        );
    }

    invocations.extend(context.plan(
        &AptCommand::from_operation(operation, operands),
        &extra_args,
        now,
    ));

    for invocation in invocations {
        println!("{}", invocation);
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use {super::*, indoc::indoc};

    fn tempdir() -> Result<tempfile::TempDir> {
        tempfile::Builder::new()
            .prefix("nci-jobs-tool-")
            .tempdir()
            .map_err(|e| ToolError::IoPath("tempdir".into(), e))
    }

    fn write(path: &Path, data: &str) -> Result<()> {
        std::fs::write(path, data).map_err(|e| ToolError::IoPath(format!("{}", path.display()), e))
    }

    #[test]
    fn generate_job_list() -> Result<()> {
        let td = tempdir()?;
        let axes = td.path().join("axes.yaml");
        write(
            &axes,
            indoc! {"
                series: [jammy]
                current_series: jammy
                types: [unstable, release]
                architectures: [amd64]
            "},
        )?;
        for t in ["unstable", "release"] {
            write(
                &td.path().join(format!("{}.yaml", t)),
                indoc! {"
                    - name: kcalc
                      component: kde
                      upstream_source:
                        type: git
                        url: https://invent.kde.org/utilities/kcalc
                      packaging_source:
                        url: https://invent.kde.org/neon/kde/kcalc
                "},
            )?;
        }

        let yaml = generate(&axes, td.path(), "yaml")?;
        assert!(yaml.contains("key: jammy_unstable_kde_kcalc_bin_amd64"));
        assert!(yaml.contains("kind: merge"));

        let json = generate(&axes, td.path(), "json")?;
        let jobs: Vec<serde_json::Value> = serde_json::from_str(&json)?;
        let merger = jobs
            .iter()
            .find(|j| j["key"] == "merger_kcalc")
            .expect("merger generated");
        assert_eq!(merger["upstream_triggers"].as_array().map(|x| x.len()), Some(2));

        assert!(matches!(
            generate(&axes, td.path(), "xml"),
            Err(ToolError::UnknownFormat(_))
        ));

        Ok(())
    }

    #[test]
    fn missing_projects_file() -> Result<()> {
        let td = tempdir()?;
        let axes = td.path().join("axes.yaml");
        write(
            &axes,
            "series: [jammy]\ncurrent_series: jammy\ntypes: [unstable]\narchitectures: [amd64]\n",
        )?;

        assert!(matches!(
            generate(&axes, td.path(), "yaml"),
            Err(ToolError::Jobs(JobsError::MissingProjectsFile(..)))
        ));

        Ok(())
    }

    #[test]
    fn version_checks() -> Result<()> {
        let theirs = TheirVersions::from_apt_cache_policy(indoc! {"
            kcalc:
              Installed: (none)
              Candidate: 4:23.08.0-0ubuntu1
            okular:
              Installed: (none)
              Candidate: 4:23.08.0-0ubuntu1
        "})?;
        let packages = vec![
            Package::new("kcalc", "4:23.08.1-0neon+22.04+jammy+release+build10"),
            Package::new("okular", "4:23.04.0-0neon+22.04+jammy+release+build3"),
            Package::new("plasma-welcome", "5.27.7-0neon+22.04+jammy+release+build1"),
        ];

        let report = check_versions(&VersionCheckInput {
            packages: packages.clone(),
            theirs: theirs.clone(),
            future: None,
            overrides: BTreeSet::new(),
        })?;
        assert_eq!(
            report.failures().map(|(p, _)| p.name.as_str()).collect::<Vec<_>>(),
            vec!["okular"]
        );

        let report = check_versions(&VersionCheckInput {
            packages,
            theirs,
            future: Some(vec![Package::new("kcalc", "4:23.08.2-0neon+24.04+noble+release+build1")]),
            overrides: ["okular".to_string()].into_iter().collect(),
        })?;
        assert!(report.is_success());

        Ok(())
    }
}
