use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use tusker_core::{
    Envelope, MahoutInfo, Payload, Result, Role, SceneObservation, SightingSource, Topic,
};
use tusker_storage::ContextStore;

use super::RoleHandler;
use crate::enrich::{EmotionReading, Enricher, SceneAnalysis};
use crate::services::AgentServices;

const TOPICS: &[Topic] = &[Topic::SceneObservation];

fn scene_prompt(observation: &SceneObservation) -> String {
    format!(
        "Analyze this scene from a robotic elephant's perspective:\n\
         Observation: {}\n\
         Faces visible: {}\n\
         Reported obstacles: {}\n\n\
         Describe:\n\
         1. The environment (indoor/outdoor, lighting conditions)\n\
         2. Notable objects or people\n\
         3. Any potential obstacles or interesting elements\n\
         4. Emotional tone of the scene\n\n\
         Return your analysis in JSON format with these keys:\n\
         environment, objects, obstacles, emotional_tone",
        observation.description,
        observation.faces,
        observation.obstacles.join(", "),
    )
}

fn emotion_prompt(observation: &SceneObservation) -> String {
    format!(
        "Analyze the facial expressions of the {} people in this scene:\n\
         {}\n\n\
         Return a JSON with:\n\
         - dominant_emotion\n\
         - confidence\n\
         - description",
        observation.faces, observation.description,
    )
}

/// Turns camera observations into obstacles, face sightings and JSON scene
/// and emotion analyses.
pub struct VisionHandler {
    services: Arc<AgentServices>,
    enricher: Enricher,
    scene_interval: Duration,
    last_scene_analysis: Option<Instant>,
    face_in_view: bool,
}

impl VisionHandler {
    pub fn new(services: Arc<AgentServices>) -> Self {
        Self {
            enricher: Enricher::new(services.gateway.clone()),
            scene_interval: Duration::from_secs(services.config.vision.scene_interval_secs),
            last_scene_analysis: None,
            face_in_view: false,
            services,
        }
    }

    fn publish(&self, topic: Topic, payload: Payload) {
        if let Err(e) = self.services.bus.publish(topic, payload) {
            warn!(topic = %topic, error = %e, "Publish failed");
        }
    }

    fn scene_due(&self) -> bool {
        self.last_scene_analysis
            .map_or(true, |at| at.elapsed() >= self.scene_interval)
    }

    async fn analyze_scene(&mut self, store: &mut ContextStore, observation: &SceneObservation) {
        if !self.scene_due() || !self.enricher.available().await {
            return;
        }
        let Some(analysis) = self
            .enricher
            .json::<SceneAnalysis>(Role::Vision, &scene_prompt(observation))
            .await
        else {
            return;
        };

        match Payload::json(&analysis) {
            Ok(payload) => self.publish(Topic::SceneDescription, payload),
            Err(e) => warn!(error = %e, "Failed to encode scene analysis"),
        }
        self.last_scene_analysis = Some(Instant::now());
        store.append_short_term(
            Role::Vision,
            format!("Scene analysis: {}", analysis.environment),
        );
        info!(environment = %analysis.environment, "Scene analysed");
    }

    /// Report whether a face is in view. Absence is only reported once, after a sighting.
    fn report_face(&mut self, in_view: bool) {
        if !in_view && !self.face_in_view {
            return;
        }
        self.face_in_view = in_view;
        let sighting = MahoutInfo {
            face_recognized: in_view,
            source: Some(SightingSource::Face),
            ..MahoutInfo::default()
        };
        match Payload::json(&sighting) {
            Ok(payload) => self.publish(Topic::MahoutDetected, payload),
            Err(e) => warn!(error = %e, "Failed to encode face sighting"),
        }
    }

    async fn analyze_faces(&mut self, store: &mut ContextStore, observation: &SceneObservation) {
        if !self.enricher.available().await {
            return;
        }
        let Some(reading) = self
            .enricher
            .json::<EmotionReading>(Role::Vision, &emotion_prompt(observation))
            .await
        else {
            return;
        };
        match serde_json::to_string(&reading) {
            Ok(text) => self.publish(Topic::EmotionDetected, Payload::text(text)),
            Err(e) => warn!(error = %e, "Failed to encode emotion reading"),
        }
        store.append_short_term(
            Role::Vision,
            format!("Face emotion: {}", reading.dominant_emotion),
        );
    }
}

#[async_trait]
impl RoleHandler for VisionHandler {
    fn role(&self) -> Role {
        Role::Vision
    }

    fn topics(&self) -> &'static [Topic] {
        TOPICS
    }

    async fn handle(&mut self, store: &mut ContextStore, envelope: Envelope) -> Result<()> {
        let observation: SceneObservation = envelope.payload.decode()?;
        debug!(
            faces = observation.faces,
            obstacles = observation.obstacles.len(),
            "Scene observation"
        );

        for obstacle in &observation.obstacles {
            self.publish(Topic::ObstacleDetected, Payload::text(obstacle.clone()));
        }
        self.report_face(observation.faces > 0);
        if observation.faces > 0 {
            self.analyze_faces(store, &observation).await;
        }
        self.analyze_scene(store, &observation).await;
        Ok(())
    }
}
