// ==========================================
// 集货分配系统 - 命令行入口
// ==========================================
// 用法:
//   freight-routing [db_path] recalc <YYYY-MM-DD>...
//   freight-routing [db_path] import-volumes <file>
//   freight-routing [db_path] import-cps <file>
//   freight-routing [db_path] import-depots <file>
// db_path 省略时使用 FREIGHT_ROUTING_DB_PATH 或用户数据目录
// ==========================================

use std::error::Error;

use chrono::NaiveDate;
use serde_json::json;

use freight_routing::app::{get_default_db_path, AppState};
use freight_routing::db::DATE_FORMAT;

const COMMANDS: &[&str] = &["recalc", "import-volumes", "import-cps", "import-depots"];
const CLI_ACTOR: &str = "cli";

fn usage() -> String {
    format!(
        "用法: freight-routing [db_path] <{}> <参数>...",
        COMMANDS.join("|")
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    freight_routing::logging::init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let db_path = match args.first() {
        Some(first) if !COMMANDS.contains(&first.as_str()) => args.remove(0),
        _ => get_default_db_path(),
    };
    if args.is_empty() {
        return Err(usage().into());
    }
    let command = args.remove(0);

    tracing::info!(
        app = freight_routing::APP_NAME,
        version = freight_routing::VERSION,
        db_path = %db_path,
        command = %command,
        "启动"
    );
    let state = AppState::new(db_path)?;

    match command.as_str() {
        "recalc" => {
            let dates = args
                .iter()
                .map(|raw| NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT))
                .collect::<Result<Vec<NaiveDate>, _>>()
                .map_err(|e| format!("日期格式错误（应为 YYYY-MM-DD）: {}", e))?;
            if dates.is_empty() {
                return Err("recalc 至少需要一个日期".into());
            }

            let results = state.allocation_service.recalc_dates(&dates, CLI_ACTOR).await;
            let mut failed = 0usize;
            for (date, result) in results {
                let line = match result {
                    Ok(outcome) => json!({ "date": date, "ok": true, "outcome": outcome }),
                    Err(e) => {
                        failed += 1;
                        json!({
                            "date": date,
                            "ok": false,
                            "retryable": e.is_retryable(),
                            "error": e.to_string(),
                        })
                    }
                };
                println!("{}", line);
            }
            if failed > 0 {
                return Err(format!("{} 个日期重算失败", failed).into());
            }
        }
        "import-volumes" => {
            let file = args.first().ok_or("import-volumes 需要文件路径")?;
            let summary = state.volume_importer.import_file(file, CLI_ACTOR)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        "import-cps" => {
            let file = args.first().ok_or("import-cps 需要文件路径")?;
            let summary = state
                .master_data_importer
                .import_collection_points_file(file, CLI_ACTOR)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        "import-depots" => {
            let file = args.first().ok_or("import-depots 需要文件路径")?;
            let summary = state.master_data_importer.import_depots_file(file, CLI_ACTOR)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        other => return Err(format!("未知命令: {}\n{}", other, usage()).into()),
    }

    Ok(())
}
