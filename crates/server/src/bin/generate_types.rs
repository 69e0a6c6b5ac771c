use std::{env, fs, path::Path};

use ts_rs::TS;

fn generate_types_content() -> String {
    let header = "// This file was generated by `cargo run --bin generate_types`. Do not edit it manually.\n\n";
    let decls = [
        utils::response::ApiResponse::<()>::decl(),
        db::models::profile::Profile::decl(),
        db::models::profile::UpdateProfile::decl(),
        db::models::entry::EntryKind::decl(),
        db::models::entry::EntryFilter::decl(),
        db::models::journal_entry::JournalEntry::decl(),
        db::models::journal_entry::CreateJournalEntry::decl(),
        db::models::journal_entry::UpdateJournalEntry::decl(),
        db::models::mood_entry::MoodEntry::decl(),
        db::models::mood_entry::CreateMoodEntry::decl(),
        db::models::mood_entry::UpdateMoodEntry::decl(),
        db::models::shared_reflection::SharedReflection::decl(),
        db::models::entry_access_log::EntryAccessLog::decl(),
        db::models::private_note::PrivateNote::decl(),
        db::models::private_note::UpsertPrivateNote::decl(),
        services::services::auth::RegisterRequest::decl(),
        services::services::auth::LoginRequest::decl(),
        services::services::auth::AuthResponse::decl(),
        services::services::partner::InvitePartnerRequest::decl(),
        services::services::partner::LinkResponse::decl(),
        services::services::entries::ShareEntryRequest::decl(),
        services::services::reflection::RegenerationPolicy::decl(),
        services::services::reflection::BackfillReflectionRequest::decl(),
        services::services::reflection::DailyRunSummary::decl(),
        services::services::calendar::CalendarDay::decl(),
        services::services::stats::Statistics::decl(),
        services::services::audio::AudioUpload::decl(),
        server::routes::health::HealthStatus::decl(),
        server::routes::reflections::ReflectionQuery::decl(),
        server::routes::cron::DailyRunQuery::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|d| {
            let trimmed = d.trim_start();
            if trimmed.starts_with("export") {
                trimmed.to_string()
            } else {
                format!("export {trimmed}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{header}{body}\n")
}

fn main() {
    let check_mode = env::args().any(|arg| arg == "--check");
    let shared_path = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/../../shared"));
    let types_path = shared_path.join("types.ts");
    let generated = generate_types_content();

    if check_mode {
        let current = fs::read_to_string(&types_path).unwrap_or_default();
        if current == generated {
            println!("shared/types.ts is up to date.");
            std::process::exit(0);
        }
        eprintln!("shared/types.ts is not up to date. Please run 'cargo run --bin generate_types' and commit the changes.");
        std::process::exit(1);
    }

    fs::create_dir_all(shared_path).expect("cannot create shared");
    fs::write(&types_path, generated).expect("unable to write types.ts");
    println!("Wrote {}", types_path.display());
}
