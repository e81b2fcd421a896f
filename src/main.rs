// ==========================================
// 包装 ERP - 命令行入口
// ==========================================
// 用法:
//   erp-import import <clientes|suajes|cotizaciones> <archivo> [usuario]
//   erp-import template <variante> <salida.xlsx|salida.csv>
//   erp-import report <variante> <archivo> <salida.xlsx|salida.csv>
//   erp-import reconcile <estado_de_cuenta> [--confirm-exact]
//   erp-import logs [limite]
//   erp-import config <clave> [valor]
// 数据库: ERP_IMPORT_DB_PATH，未设置时使用用户数据目录
// ==========================================

use anyhow::{anyhow, bail, Context, Result};
use erp_import::api::{ImportApi, ReconcileApi, DEFAULT_LOG_LIMIT};
use erp_import::config::ConfigManager;
use erp_import::db::{init_schema, open_sqlite_connection};
use erp_import::domain::{AuthContext, ImportProgress, ImportVariant};
use erp_import::importer::CancelToken;
use erp_import::logging;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

const USAGE: &str = "usage: erp-import <import|template|report|reconcile|logs|config> [args...]";

/// 数据库路径: ERP_IMPORT_DB_PATH > 用户数据目录 > 当前目录
fn default_db_path() -> PathBuf {
    if let Ok(path) = std::env::var("ERP_IMPORT_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    match dirs::data_dir() {
        Some(data_dir) => {
            let dir = data_dir.join("erp-import");
            std::fs::create_dir_all(&dir).ok();
            dir.join("erp_import.db")
        }
        None => PathBuf::from("./erp_import.db"),
    }
}

fn parse_variant(raw: Option<&String>) -> Result<ImportVariant> {
    let raw = raw.ok_or_else(|| anyhow!("missing import variant\n{}", USAGE))?;
    ImportVariant::parse(raw).ok_or_else(|| {
        anyhow!(
            "unknown import variant '{}' (expected clientes, suajes or cotizaciones)",
            raw
        )
    })
}

fn required_path(raw: Option<&String>, what: &str) -> Result<PathBuf> {
    raw.map(PathBuf::from)
        .ok_or_else(|| anyhow!("missing {}\n{}", what, USAGE))
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("");

    let db_path = default_db_path();
    let db_path_str = db_path.to_string_lossy().to_string();
    info!(version = erp_import::VERSION, db = %db_path_str, "erp-import 启动");

    let conn = open_sqlite_connection(&db_path_str)
        .with_context(|| format!("cannot open database {}", db_path_str))?;
    init_schema(&conn).context("schema initialization failed")?;
    let conn = Arc::new(Mutex::new(conn));

    match command {
        "import" => {
            let variant = parse_variant(args.get(1))?;
            let file = required_path(args.get(2), "input file")?;
            let user = args
                .get(3)
                .cloned()
                .or_else(|| std::env::var("ERP_IMPORT_USER").ok());
            run_import(ImportApi::from_connection(conn)?, variant, &file, user).await
        }
        "template" => {
            let variant = parse_variant(args.get(1))?;
            let output = required_path(args.get(2), "output file")?;
            ImportApi::from_connection(conn)?.write_template(variant, &output)?;
            println!("template written to {}", output.display());
            Ok(())
        }
        "report" => {
            let variant = parse_variant(args.get(1))?;
            let file = required_path(args.get(2), "input file")?;
            let output = required_path(args.get(3), "output file")?;
            let api = ImportApi::from_connection(conn)?;
            let session = api.open_session(variant, &file).await?;
            let written = api.export_error_report(&session, &output)?;
            println!("{} error row(s) written to {}", written, output.display());
            Ok(())
        }
        "reconcile" => {
            let statement = required_path(args.get(1), "bank statement file")?;
            let confirm = args.iter().any(|a| a == "--confirm-exact");
            run_reconcile(ReconcileApi::from_connection(conn)?, &statement, confirm).await
        }
        "logs" => {
            let limit = match args.get(1) {
                Some(raw) => raw
                    .parse::<usize>()
                    .with_context(|| format!("invalid limit '{}'", raw))?,
                None => DEFAULT_LOG_LIMIT,
            };
            let logs = ImportApi::from_connection(conn)?.list_import_logs(limit).await?;
            println!("{}", serde_json::to_string_pretty(&logs)?);
            Ok(())
        }
        "config" => {
            let key = args
                .get(1)
                .ok_or_else(|| anyhow!("missing config key\n{}", USAGE))?;
            let manager = ConfigManager::from_connection(conn).map_err(|e| anyhow!(e))?;
            match args.get(2) {
                Some(value) => {
                    manager.set_global_value(key, value).map_err(|e| anyhow!(e))?;
                    println!("{} = {}", key, value);
                }
                None => {
                    let value = manager.get_global_value(key).map_err(|e| anyhow!(e))?;
                    println!("{} = {}", key, value.unwrap_or_else(|| "(default)".to_string()));
                }
            }
            Ok(())
        }
        _ => bail!("{}", USAGE),
    }
}

async fn run_import(
    api: ImportApi,
    variant: ImportVariant,
    file: &Path,
    user: Option<String>,
) -> Result<()> {
    let session = api.open_session(variant, file).await?;
    let counts = session.status_counts();
    println!(
        "{}: {} row(s) | valid {} | warning {} | error {}",
        file.display(),
        counts.total(),
        counts.valid,
        counts.warning,
        counts.error
    );

    if !session.can_import() {
        let report = file.with_extension("errores.xlsx");
        api.export_error_report(&session, &report)?;
        bail!(
            "{} row(s) have errors; fix them and retry (report: {})",
            counts.error,
            report.display()
        );
    }

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("收到中断信号，当前行完成后停止导入");
            on_interrupt.cancel();
        }
    });

    let auth = user.map(AuthContext::new);
    let progress = |p: ImportProgress| {
        eprint!("\r{}/{} ({:.0}%)", p.processed, p.total, p.fraction() * 100.0);
    };
    let entry = api.commit(&session, auth.as_ref(), &progress, &cancel).await?;
    eprintln!();

    println!(
        "inserted {} | updated {} | errored {} | skipped {}{}",
        entry.counts.inserted,
        entry.counts.updated,
        entry.counts.errored,
        entry.counts.skipped,
        if entry.cancelled { " (cancelled)" } else { "" }
    );
    for manifest in &entry.error_manifest {
        println!("  row {}: {}", manifest.row_index, manifest.messages.join("; "));
    }
    Ok(())
}

async fn run_reconcile(api: ReconcileApi, statement: &Path, confirm: bool) -> Result<()> {
    let report = api.propose(statement).await?;

    for proposal in &report.proposals {
        println!(
            "row {} -> payment #{} ({:?}, diff {:.2}, {} day(s))",
            proposal.statement_row,
            proposal.payment_id,
            proposal.confidence,
            proposal.amount_diff,
            proposal.days_apart
        );
    }
    for row in &report.unmatched_rows {
        println!("row {} -> no candidate", row);
    }
    for rejected in &report.rejected_rows {
        println!("row {} rejected: {}", rejected.row_index, rejected.messages.join("; "));
    }

    if confirm {
        let confirmed = api.confirm_exact(&report).await?;
        println!("{} exact proposal(s) confirmed", confirmed);
    }
    Ok(())
}
