use chrono::{TimeZone, Utc};
use tusker_core::{Paths, Role};
use tusker_storage::ExperienceRecorder;

pub async fn run(role: Role, limit: usize) -> anyhow::Result<()> {
    let paths = Paths::new();
    let recorder = ExperienceRecorder::new(paths.clone());
    let records = recorder.read_all(role)?;

    if records.is_empty() {
        println!("No experience recorded for {} yet.", role);
        println!("  ({})", paths.experience_file(role).display());
        return Ok(());
    }

    let total: f64 = records.iter().map(|r| r.reward).sum();
    println!(
        "{} records for {}, mean reward {:.2}",
        records.len(),
        role,
        total / records.len() as f64
    );
    println!();

    let skip = records.len().saturating_sub(limit);
    for record in records.iter().skip(skip) {
        let when = Utc
            .timestamp_millis_opt(record.timestamp_ms)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| record.timestamp_ms.to_string());
        let state = record
            .prior_state
            .get("current_state")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        println!(
            "  {}  {:<18} {:>5.1}  from {}",
            when, record.action, record.reward, state
        );
    }

    Ok(())
}
