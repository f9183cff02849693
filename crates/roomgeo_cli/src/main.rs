//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open a store from an optional JSON config and run one save/load cycle.
//! - Print a deterministic summary for quick local sanity checks.
//!
//! Usage: `roomgeo_cli [config.json]`

use log::info;
use roomgeo_core::db::open_db;
use roomgeo_core::{
    core_version, init_logging_from_config, load_config, GeometryVersionService, RoomStore,
    SaveRevisionRequest, StoreConfig, TransactionContext,
};
use serde_json::json;
use std::error::Error;
use std::process::ExitCode;
use uuid::Uuid;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("roomgeo_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => load_config(path)?,
        None => StoreConfig::default(),
    };
    init_logging_from_config(&config)?;
    println!("roomgeo_core version={}", core_version());

    let conn = open_db(&config.database_path)?;
    let author = Uuid::new_v4();
    let rooms = RoomStore;
    let setup = TransactionContext::none(&conn);
    let project = rooms.create_project(&setup, "smoke", author)?;
    let room = rooms.create_room(&setup, project.uuid, "living")?;

    let service = GeometryVersionService::from_config(&conn, &config);
    for width in [3.0, 3.5] {
        let request = SaveRevisionRequest::new(
            "wall-a",
            room.uuid,
            author,
            json!({ "kind": "wall", "width": width }),
        );
        let revision = service.save_revision(&request)?;
        info!("event=cli_save module=cli status=ok revision_id={revision}");
    }

    for version in service.list_room_versions(room.uuid)? {
        let revisions = service.load_revision_list(version.uuid)?;
        println!(
            "version={} name={} mode={} revisions={}",
            version.uuid,
            version.name,
            service.mode().as_str(),
            revisions.len()
        );
        for summary in revisions {
            println!("  revision={} created_at={}", summary.uuid, summary.created_at);
        }
    }
    Ok(())
}
