//! `modsync` CLI entrypoint.
//!
//! Loads configuration and the installed-package catalog, then checks for or
//! installs updates. Exits with status 1 when any package ended in an error.

use std::io::Write;
use std::rc::Rc;

use clap::Parser;
use modsync_updater::auth::{AuthOutcome, DeviceAuthorizer};
use modsync_updater::catalog::{CatalogEntry, PackageCatalog, TomlCatalog};
use modsync_updater::cli::{Cli, Command, PackageArgs};
use modsync_updater::clock::{Clock, SystemClock};
use modsync_updater::config::{Config, GITHUB_TOKEN_ENV};
use modsync_updater::download::HttpDownloader;
use modsync_updater::error::{Result, UpdaterError};
use modsync_updater::host::{HostLayout, SidecarIdentityReader};
use modsync_updater::http::{RegistryClient, UreqClient};
use modsync_updater::output::{ConsolePrompt, print_registry, print_reports, write_stderr_line};
use modsync_updater::pipeline::{PackageReport, RunOptions, UpdatePipeline};
use modsync_updater::registry::{BuiltinExtensions, ProviderRegistry};

struct Services {
    config: Config,
    client: Rc<dyn RegistryClient>,
    clock: Rc<dyn Clock>,
}

impl Services {
    fn registry(&self) -> ProviderRegistry {
        let builtin = BuiltinExtensions::new(
            Rc::clone(&self.client),
            Rc::clone(&self.clock),
            self.config.providers.clone(),
        );
        ProviderRegistry::load(&[&builtin])
    }
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let mut stderr = std::io::stderr();
    let exit_code = exit_code_for_run_result(run(&cli, &mut stderr), &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<i32> {
    let config = Config::load(cli.config.as_deref())?;
    let client: Rc<dyn RegistryClient> = Rc::new(UreqClient::new(
        config.providers.timeout(),
        config.providers.user_agent.clone(),
    ));
    let services = Services {
        config,
        client,
        clock: Rc::new(SystemClock),
    };

    match cli.command() {
        Command::Check(args) => update(&services, &args, true, cli.quiet, stderr),
        Command::Update(args) => update(&services, &args, false, cli.quiet, stderr),
        Command::Providers => {
            print_registry(stderr, &services.registry());
            Ok(0)
        }
        Command::Auth => authorize(&services, stderr),
    }
}

fn update(
    services: &Services,
    args: &PackageArgs,
    check_only: bool,
    quiet: bool,
    stderr: &mut dyn Write,
) -> Result<i32> {
    let host = &services.config.host;
    let catalog = TomlCatalog::new(host.catalog_path());
    let entries = catalog.packages()?;
    ensure_selected(&entries, args.package.as_deref())?;

    let layout = HostLayout::from_config(host);
    if !check_only {
        layout.ensure_writable()?;
    }
    let downloader = HttpDownloader::new(
        services.config.providers.timeout(),
        services.config.providers.user_agent.clone(),
    );
    let mut registry = services.registry();
    let options = RunOptions {
        check_only,
        package: args.package.clone(),
    };

    let identities = SidecarIdentityReader::for_layout(&layout);
    let reports = UpdatePipeline::new(
        &mut registry,
        &layout,
        &downloader,
        &identities,
        services.clock.as_ref(),
    )
    .run(&entries, &options);

    if !quiet {
        print_reports(stderr, &reports);
    }
    Ok(exit_code_for_reports(&reports))
}

fn ensure_selected(entries: &[CatalogEntry], package: Option<&str>) -> Result<()> {
    let Some(name) = package else {
        return Ok(());
    };
    if entries
        .iter()
        .any(|e| e.identity().name.eq_ignore_ascii_case(name))
    {
        Ok(())
    } else {
        Err(UpdaterError::UnknownPackage {
            name: name.to_owned(),
        })
    }
}

fn authorize(services: &Services, stderr: &mut dyn Write) -> Result<i32> {
    let client_id = services
        .config
        .providers
        .github
        .client_id
        .as_deref()
        .unwrap_or_default();
    let authorizer =
        DeviceAuthorizer::new(Rc::clone(&services.client), Rc::clone(&services.clock), client_id)?;
    match authorizer.authorize(&ConsolePrompt)? {
        AuthOutcome::Authorized(token) => {
            writeln!(std::io::stdout(), "{token}")
                .map_err(|source| UpdaterError::WriteFailed { source })?;
            write_stderr_line(
                stderr,
                format!("Store the token in {GITHUB_TOKEN_ENV} or providers.github.token."),
            );
            Ok(0)
        }
        AuthOutcome::Declined => {
            write_stderr_line(stderr, "Authorisation was declined.");
            Ok(1)
        }
        AuthOutcome::Expired => {
            write_stderr_line(stderr, "The device code expired before it was approved.");
            Ok(1)
        }
    }
}

fn exit_code_for_reports(reports: &[PackageReport]) -> i32 {
    i32::from(reports.iter().any(PackageReport::is_error))
}

fn exit_code_for_run_result(result: Result<i32>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(code) => code,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            1
        }
    }
}
