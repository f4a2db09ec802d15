use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use tracing::{debug, error, warn};
use tusker_core::{ActionCategory, Paths, Result, Role};

/// One (state, action, reward, next state) transition for offline learning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RlExperience {
    pub agent_role: Role,
    pub prior_state: serde_json::Value,
    pub action: String,
    pub reward: f64,
    pub next_state: serde_json::Value,
    pub timestamp_ms: i64,
}

/// Append-only experience log, one JSONL file per role under `rl_data/`.
pub struct ExperienceRecorder {
    paths: Paths,
}

impl ExperienceRecorder {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    /// Reward is derived from the action's category; unrecognised names score −0.1.
    pub fn reward_for(action: &str) -> f64 {
        ActionCategory::of_name(action).reward()
    }

    /// Build and append one record. Storage failures are logged, never returned.
    pub fn record(
        &self,
        role: Role,
        prior_state: serde_json::Value,
        action: &str,
        next_state: serde_json::Value,
    ) -> RlExperience {
        let experience = RlExperience {
            agent_role: role,
            prior_state,
            action: action.to_string(),
            reward: Self::reward_for(action),
            next_state,
            timestamp_ms: Utc::now().timestamp_millis(),
        };

        match self.append(&experience) {
            Ok(()) => debug!(
                role = %role,
                action = %action,
                reward = experience.reward,
                "Experience recorded"
            ),
            Err(e) => warn!(role = %role, action = %action, error = %e, "Failed to save RL data"),
        }
        experience
    }

    fn append(&self, experience: &RlExperience) -> Result<()> {
        let path = self.paths.experience_file(experience.agent_role);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let json = serde_json::to_string(experience)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }

    /// Read back every record for a role, skipping lines that fail to parse.
    pub fn read_all(&self, role: Role) -> Result<Vec<RlExperience>> {
        let path = self.paths.experience_file(role);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&path)?;
        let mut records = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RlExperience>(line) {
                Ok(record) => records.push(record),
                Err(e) => error!(error = %e, line = %line, "Failed to parse experience record"),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_reward_table() {
        assert_eq!(ExperienceRecorder::reward_for("turn_left"), 0.5);
        assert_eq!(ExperienceRecorder::reward_for("eye_blink"), 0.3);
        assert_eq!(ExperienceRecorder::reward_for("perform_greeting"), 1.0);
        assert_eq!(ExperienceRecorder::reward_for("unknown"), -0.1);
        assert_eq!(ExperienceRecorder::reward_for("fly"), -0.1);
    }

    #[test]
    fn test_record_appends_one_line_per_call() {
        let dir = TempDir::new().unwrap();
        let recorder = ExperienceRecorder::new(Paths::with_base(dir.path().to_path_buf()));

        let prior = json!({"current_state": "idle", "mahout_present": false, "last_actions": []});
        let next = json!({"current_state": "idle", "mahout_present": false, "last_actions": ["stop"]});
        recorder.record(Role::Supervising, prior.clone(), "stop", next.clone());
        recorder.record(Role::Supervising, next, "unknown", prior);

        let records = recorder.read_all(Role::Supervising).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action, "stop");
        assert_eq!(records[0].reward, 0.5);
        assert_eq!(records[1].reward, -0.1);
        assert!(recorder.read_all(Role::Vision).unwrap().is_empty());
    }

    #[test]
    fn test_storage_failure_is_swallowed() {
        let dir = TempDir::new().unwrap();
        // A file where the rl_data directory should be makes every append fail.
        std::fs::write(dir.path().join("rl_data"), "blocked").unwrap();
        let recorder = ExperienceRecorder::new(Paths::with_base(dir.path().to_path_buf()));

        let record = recorder.record(Role::Supervising, json!({}), "perform_dance", json!({}));
        assert_eq!(record.reward, 1.0);
    }

    #[test]
    fn test_skips_unparsable_lines() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::with_base(dir.path().to_path_buf());
        let recorder = ExperienceRecorder::new(paths.clone());
        recorder.record(Role::Rfid, json!({}), "ear_flap", json!({}));

        let mut file = OpenOptions::new()
            .append(true)
            .open(paths.experience_file(Role::Rfid))
            .unwrap();
        writeln!(file, "not json").unwrap();

        assert_eq!(recorder.read_all(Role::Rfid).unwrap().len(), 1);
    }
}
