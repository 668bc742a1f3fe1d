//! CLI inspection entry point.
//!
//! # Responsibility
//! - Open a model's store from a model directory and report record counts.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `recordstore_cli <model-dir> <model> [store-file]`.
//! Without `store-file`, the default location for the model is used.
//! Set `RECORDSTORE_LOG_DIR` to an absolute path to enable file logging.

use log::info;
use recordstore_core::{DirectoryRegistry, RecordStore, StoreConfig};
use std::process::ExitCode;

const LOG_DIR_ENV: &str = "RECORDSTORE_LOG_DIR";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (model_dir, model_name, store_file) = match args.as_slice() {
        [dir, model] => (dir, model, None),
        [dir, model, file] => (dir, model, Some(file)),
        _ => {
            eprintln!("usage: recordstore_cli <model-dir> <model> [store-file]");
            return ExitCode::from(2);
        }
    };

    if let Some(log_dir) = std::env::var_os(LOG_DIR_ENV) {
        if let Err(err) = recordstore_core::init_logging(recordstore_core::default_log_level(), log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    let registry = DirectoryRegistry::new(model_dir);
    let config = match store_file {
        Some(path) => StoreConfig::file(path),
        None => StoreConfig::from_env(model_name),
    };

    let store: RecordStore = match RecordStore::open(model_name, &registry, &config) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    println!("recordstore version={}", recordstore_core::core_version());
    println!("model={}", store.model());
    for entity in &store.schema().entities {
        match store.count(entity.name.as_str(), None, false) {
            Ok(count) => println!("entity={} records={count}", entity.name),
            Err(err) => {
                eprintln!("error: entity={} {err}", entity.name);
                return ExitCode::FAILURE;
            }
        }
    }
    info!("event=cli_inspect module=cli status=ok model={}", store.model());
    ExitCode::SUCCESS
}
