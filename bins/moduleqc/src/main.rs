//! moduleqc binary
//!
//! Entry point for the module QC tools: MAC database exports and
//! comparisons, the local mirror database, IV file uploads and condition
//! studies.

mod compare;
mod upload;

use anyhow::{Context, Result};
use chrono::Local;
use cli::{Cli, Commands, ConfigAction, MacQueryArgs, PlotArgs};
use common::{MacId, ModuleName, ModuleSelection};
use config::{
    generate_default_config, load_config, load_or_default, save_config, validate_config,
    MacConfig, QcConfig,
};
use ivcurve::file::read_iv_file;
use ivcurve::plot::{comparison_file_name, comparison_series, comparison_title};
use ivcurve::study::{find_study, process_study};
use ivcurve::{IvPlot, YScale};
use observability::init_logging;
use std::io;
use std::path::{Path, PathBuf};
use storage::export::{
    export_file_name, format_record, write_module_names_csv_file, write_records_csv_file,
    ExportKind,
};
use storage::{DatabaseCreation, LocalDatabase, MacClient, Record};
use tracing::{debug, error, info, warn};
use upload::TestEnvironment;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging("moduleqc", cli.log_format)?;

    match dotenvy::dotenv() {
        Ok(path) => debug!(?path, "Loaded environment file"),
        Err(e) if e.not_found() => debug!("No .env file found"),
        Err(e) => warn!(error = %e, "Failed to load .env file"),
    }
    debug!(?cli, "CLI arguments parsed");

    let result = run(cli).await;
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

async fn run(cli: Cli) -> Result<()> {
    let Cli {
        config: config_path,
        command,
        ..
    } = cli;
    let load = || load_or_default(&config_path);

    match command {
        Commands::Fetch { query, output_dir } => {
            info!("Executing 'fetch' command");
            fetch_command(&load()?, query, output_dir).await
        }
        Commands::Compare { query, plot } => {
            info!("Executing 'compare' command");
            compare_command(&load()?, query, plot).await
        }
        Commands::Mirror { mac, module_name } => {
            info!("Executing 'mirror' command");
            mirror_command(&load()?, &mac, &module_name).await
        }
        Commands::Upload {
            directory,
            module_name,
            temperature,
            rel_hum,
            comments,
            no_prompt,
        } => {
            info!("Executing 'upload' command");
            let config = load()?;
            let skip_prompts =
                no_prompt || temperature.is_some() || rel_hum.is_some() || comments.is_some();
            let fixed = skip_prompts.then(|| TestEnvironment {
                temperature_c: temperature.unwrap_or(config.upload.default_temperature_c),
                rel_hum: rel_hum.unwrap_or(config.upload.default_rel_hum),
                comments,
            });
            upload_command(&config, &directory, module_name.as_deref(), fixed).await
        }
        Commands::ReadLocal { module_name } => {
            info!("Executing 'read-local' command");
            read_local_command(&load()?, module_name.as_deref()).await
        }
        Commands::InitLocal { database } => {
            info!("Executing 'init-local' command");
            init_local_command(&load()?, database.as_deref()).await
        }
        Commands::Study {
            module_name,
            output,
        } => {
            info!("Executing 'study' command");
            study_command(&load()?, module_name.as_deref(), output.as_deref())
        }
        Commands::Config {
            action: ConfigAction::Init { output },
        } => {
            info!("Executing 'config init' command");
            init_command(&output)
        }
        Commands::Config {
            action: ConfigAction::Validate,
        } => {
            info!("Executing 'config validate' command");
            validate_command(&config_path)
        }
    }
}

fn lookup_mac<'a>(config: &'a QcConfig, mac: &str) -> Result<(MacId, &'a MacConfig)> {
    let id = MacId::new(mac);
    let mac_config = config.require_mac(&id)?;
    Ok((id, mac_config))
}

fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create directory: {:?}", dir))
}

const MISSING_DATA_TYPE: &str =
    "Error: --data-type is required unless --list-modules is given (mod_iv, mod_ped, mod_qcs)";

async fn fetch_command(
    config: &QcConfig,
    query: MacQueryArgs,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let (mac_id, mac_config) = lookup_mac(config, &query.mac)?;
    let client = MacClient::from_config(mac_id.clone(), mac_config);
    let output_dir = output_dir.unwrap_or_else(|| config.output_dir.clone());
    let now = Local::now().naive_local();

    if query.list_modules {
        if !mac_config.allow_module_listing {
            println!("Module listing is not available for {}", mac_id);
            return Ok(());
        }
        let names = client
            .fetch_all_module_names()
            .await
            .with_context(|| format!("Failed to list modules at {}", mac_id))?;
        println!("{}", found_modules_message(names.len()));

        ensure_dir(&output_dir)?;
        let path = output_dir.join(export_file_name(&mac_id, ExportKind::ModuleNames, now));
        write_module_names_csv_file(&path, &names)
            .with_context(|| format!("Failed to write {:?}", path))?;
        println!("Output saved in {}", path.display());
        return Ok(());
    }

    let Some(data_type) = query.data_type else {
        println!("{}", MISSING_DATA_TYPE);
        return Ok(());
    };

    let selection = ModuleSelection::from_args(&query.module_names);
    let records = client
        .fetch_testing_data(data_type, &selection)
        .await
        .with_context(|| format!("Failed to fetch {} from {}", data_type, mac_id))?;

    let kind = if selection.is_all() {
        ExportKind::AsOf(data_type)
    } else {
        ExportKind::Custom(data_type)
    };
    match export_records(&output_dir, &export_file_name(&mac_id, kind, now), &records)? {
        Some(path) => println!("Output saved in {}", path.display()),
        None => println!("No results found."),
    }
    Ok(())
}

fn found_modules_message(count: usize) -> String {
    format!("Found {} modules", count)
}

/// Write records as CSV into `dir`; nothing is written for an empty result.
fn export_records(dir: &Path, file_name: &str, records: &[Record]) -> Result<Option<PathBuf>> {
    if records.is_empty() {
        return Ok(None);
    }
    ensure_dir(dir)?;
    let path = dir.join(file_name);
    write_records_csv_file(&path, records)
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(Some(path))
}

async fn compare_command(config: &QcConfig, query: MacQueryArgs, plot: PlotArgs) -> Result<()> {
    let (mac_id, mac_config) = lookup_mac(config, &query.mac)?;
    let client = MacClient::from_config(mac_id.clone(), mac_config);

    if query.list_modules {
        if !mac_config.allow_module_listing {
            println!("Module listing is not available for {}", mac_id);
            return Ok(());
        }
        let names = client
            .fetch_all_module_names()
            .await
            .with_context(|| format!("Failed to list modules at {}", mac_id))?;
        println!("Modules at {} ({}):", mac_id, names.len());
        for name in &names {
            println!("{}", name);
        }
        return Ok(());
    }

    let Some(data_type) = query.data_type else {
        println!("{}", MISSING_DATA_TYPE);
        return Ok(());
    };
    let selection = ModuleSelection::from_args(&query.module_names);

    if plot.plot {
        if data_type.is_plottable() {
            return plot_comparison(config, &client, &selection, plot).await;
        }
        warn!(%data_type, "Plotting is only available for mod_iv, printing records instead");
    }

    let records = client
        .fetch_testing_data(data_type, &selection)
        .await
        .with_context(|| format!("Failed to fetch {} from {}", data_type, mac_id))?;
    if records.is_empty() {
        println!("No {} records found for {}", data_type, selection);
        return Ok(());
    }
    for record in &records {
        println!("{}", format_record(record));
    }
    Ok(())
}

async fn plot_comparison(
    config: &QcConfig,
    client: &MacClient,
    selection: &ModuleSelection,
    plot: PlotArgs,
) -> Result<()> {
    let mac = client.id().to_string();
    let records = client
        .fetch_iv_curves(selection)
        .await
        .with_context(|| format!("Failed to fetch IV curves from {}", mac))?;

    let site = &config.upload.reference_site;
    let curves = compare::curves_from_records(&records, &mac, plot.labels);
    let references =
        compare::load_references(&plot.references, &plot.reference_labels, site)?;

    let series = comparison_series(&curves, &references);
    if series.is_empty() {
        println!("No IV curves to plot for {}", selection);
        return Ok(());
    }

    let (scale, x_range, y_range) = if plot.log_scale {
        let p = &config.plot;
        (
            YScale::Log,
            Some((p.voltage_range[0], p.voltage_range[1])),
            Some((p.current_range_log[0], p.current_range_log[1])),
        )
    } else {
        (YScale::Linear, None, None)
    };

    let modules = (!selection.is_all()).then(|| selection.label());
    let title = comparison_title(
        &mac,
        modules.as_deref(),
        (!references.is_empty()).then_some(site.as_str()),
    );

    let output_dir = plot.output_dir.unwrap_or_else(|| config.output_dir.clone());
    ensure_dir(&output_dir)?;
    let path = output_dir.join(comparison_file_name(&mac, &selection.label(), scale));

    IvPlot::new(title)
        .size(config.plot.width, config.plot.height)
        .y_scale(scale)
        .ranges(x_range, y_range)
        .with_series(series)
        .render(&path)
        .with_context(|| format!("Failed to render {:?}", path))?;

    println!("Plot saved in {}", path.display());
    Ok(())
}

fn report_creation(database: &str, creation: DatabaseCreation) {
    match creation {
        DatabaseCreation::Created => println!("Database '{}' created successfully.", database),
        DatabaseCreation::AlreadyExists => println!("Database '{}' already exists.", database),
    }
}

async fn mirror_command(config: &QcConfig, mac: &str, module_name: &str) -> Result<()> {
    let (mac_id, mac_config) = lookup_mac(config, mac)?;
    let module = ModuleName::parse(module_name)?;
    let client = MacClient::from_config(mac_id.clone(), mac_config);
    let local = LocalDatabase::from_config(&config.local_database);

    let creation = local
        .create_database()
        .await
        .context("Failed to create local database")?;
    report_creation(local.database_name(), creation);

    let records = client
        .fetch_latest_iv(&module)
        .await
        .with_context(|| format!("Failed to fetch latest IV test of {} from {}", module, mac_id))?;
    if records.is_empty() {
        println!("No IV tests found for {} at {}", module, mac_id);
        return Ok(());
    }

    let now = Local::now().naive_local();
    let rows: Vec<_> = records
        .iter()
        .map(|r| storage::NewModuleTest::from_mac_iv(r, &mac_id, now))
        .collect();
    let inserted = local
        .insert_module_tests(&rows)
        .await
        .context("Failed to insert into local database")?;

    println!(
        "Inserted {} record(s) for {} from {} into {}",
        inserted,
        module,
        mac_id,
        local.database_name()
    );
    Ok(())
}

async fn upload_command(
    config: &QcConfig,
    directory: &Path,
    module_name: Option<&str>,
    fixed: Option<TestEnvironment>,
) -> Result<()> {
    let local = LocalDatabase::from_config(&config.local_database);
    let creation = local
        .create_database()
        .await
        .context("Failed to create local database")?;
    report_creation(local.database_name(), creation);

    let files = upload::collect_iv_files(directory, &config.upload.file_extension, module_name)?;
    if files.is_empty() {
        println!("No data files found in {}", directory.display());
        return Ok(());
    }

    for (path, module) in files {
        let file = path.display().to_string();
        let env = match &fixed {
            Some(env) => env.clone(),
            None => upload::prompt_environment(
                &mut io::stdin().lock(),
                &mut io::stdout(),
                &file,
                &config.upload,
            )
            .context("Failed to read environment input")?,
        };
        println!(
            "Processing {} with Temperature: {:?}°C, RH: {:?}%",
            file, env.temperature_c, env.rel_hum
        );

        let curve = read_iv_file(&path).with_context(|| format!("Failed to parse {}", file))?;
        if curve.voltage.is_empty() {
            println!("No valid data found in {}", file);
            continue;
        }

        let row = upload::upload_record(
            &path,
            &curve,
            &module,
            &env,
            &config.upload.reference_site,
            Local::now().naive_local(),
        );
        local
            .insert_module_tests(&[row])
            .await
            .with_context(|| format!("Failed to upload {}", file))?;
        println!("Data uploaded successfully for {} (module {}).", file, module);
    }
    Ok(())
}

async fn read_local_command(config: &QcConfig, module_name: Option<&str>) -> Result<()> {
    let local = LocalDatabase::from_config(&config.local_database);
    let module = module_name.map(ModuleName::new);

    let rows = local
        .read_module_tests(module.as_ref())
        .await
        .context("Failed to read module_tests")?;

    if rows.is_empty() {
        println!(
            "No data found in module_tests for module_name={}.",
            module.as_ref().map(ModuleName::as_str).unwrap_or("any")
        );
        return Ok(());
    }

    println!("Found {} rows in module_tests:", rows.len());
    for row in &rows {
        println!("{}", format_record(&row.to_record()));
    }
    Ok(())
}

async fn init_local_command(config: &QcConfig, database: Option<&str>) -> Result<()> {
    let mut local = LocalDatabase::from_config(&config.local_database);
    if let Some(name) = database {
        local = local.with_database(name);
    }

    let creation = local
        .create_database()
        .await
        .context("Failed to create local database")?;
    report_creation(local.database_name(), creation);

    let plan = local
        .ensure_schema()
        .await
        .context("Failed to prepare module_tests")?;
    match plan {
        storage::SchemaPlan::CreateTable => println!("Created table module_tests."),
        storage::SchemaPlan::Alter(changes) if changes.is_empty() => {
            println!("Table module_tests is up to date.")
        }
        storage::SchemaPlan::Alter(changes) => {
            println!("Updated table module_tests:");
            for change in &changes {
                println!("  {}", change.to_sql("module_tests"));
            }
        }
    }
    Ok(())
}

fn study_command(config: &QcConfig, module_name: Option<&str>, output: Option<&str>) -> Result<()> {
    let studies = match module_name {
        Some(name) => vec![find_study(&config.studies, name)?],
        None => config.studies.iter().collect(),
    };
    if studies.is_empty() {
        println!("No condition studies configured.");
        return Ok(());
    }

    for study in studies {
        let (analysis, path) = process_study(study, &config.plot, output)
            .with_context(|| format!("Processing failed for {}", study.module))?;
        println!(
            "{}: leakage current {:.4} µA ({} at {} V) to {:.4} µA ({} at {} V)",
            study.module,
            analysis.min.current_ua,
            analysis.min.condition,
            analysis.min.voltage,
            analysis.max.current_ua,
            analysis.max.condition,
            analysis.max.voltage
        );
        println!("Plot saved in {}", path.display());
    }
    Ok(())
}

fn validate_command(config_path: &Path) -> Result<()> {
    info!(path = ?config_path, "Validating configuration");

    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "Failed to load configuration");
            anyhow::bail!(e);
        }
    };

    let report = validate_config(&config);

    println!("\n=== Configuration Validation Report ===\n");

    if !report.defaults_applied.is_empty() {
        println!("Defaults Applied ({}):", report.defaults_applied.len());
        for default in &report.defaults_applied {
            println!("  [info] {} = {}", default.field, default.value);
        }
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!(
        "Local database: {}@{}:{}/{}",
        config.local_database.user,
        config.local_database.host,
        config.local_database.port,
        config.local_database.database
    );
    let macs: Vec<String> = config.mac_ids().iter().map(|m| m.to_string()).collect();
    println!("MACs: {}", macs.join(", "));
    println!("Condition studies: {}", config.studies.len());

    Ok(())
}

fn init_command(output_path: &Path) -> Result<()> {
    info!(?output_path, "Initializing new configuration file");

    let config = generate_default_config();

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }

    save_config(&config, output_path)?;

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    println!();
    println!("This configuration includes:");
    println!("  - Local mirror database (hgcdb_fnal on localhost)");
    println!("  - 2 MAC sites (CMU, UCSB)");
    println!("  - Upload defaults and plot ranges");
    println!();
    println!("Next steps:");
    println!("  1. Set DB_PASSWORD in the environment or a .env file");
    println!("  2. Add condition studies under 'studies' if needed");
    println!(
        "  3. Run 'moduleqc config validate --config {:?}' to check configuration",
        output_path
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::CellValue;

    #[test]
    fn test_empty_export_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("exports");

        let written = export_records(&out, "CMU_mod_iv_asof_2025-07-01T120000.csv", &[]).unwrap();
        assert!(written.is_none());
        assert!(!out.exists());
    }

    #[test]
    fn test_export_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let mut record = Record::new();
        record.push("module_name", CellValue::Text("320-ML-F3TC-CM-0102".into()));
        record.push("mod_ivtest_no", CellValue::Int(3));

        let path = export_records(dir.path(), "CMU_mod_iv_custom.csv", &[record])
            .unwrap()
            .unwrap();
        assert_eq!(path, dir.path().join("CMU_mod_iv_custom.csv"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("module_name,mod_ivtest_no"));
        assert!(content.contains("320-ML-F3TC-CM-0102,3"));
    }

    #[test]
    fn test_found_modules_message() {
        assert_eq!(found_modules_message(42), "Found 42 modules");
    }
}
