use serde_json::Value;
use uuid::Uuid;

use super::storage::{WriteLayer, AGENTS_KEY};
use super::{DataService, Source};
use crate::core::agent::{Agent, AgentDraft, AgentPatch, AgentStatus, AgentType, RawAgent};
use crate::core::time;

/// Agent registry. Exactly one primary agent exists after every load;
/// subagents are user-managed and persisted through the write layer.
#[derive(Default)]
pub struct AgentStore {
    agents: Vec<Agent>,
    loaded: bool,
    skipped: usize,
}

impl AgentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, service: &DataService, storage: &WriteLayer) {
        self.agents.clear();
        self.skipped = 0;

        if let Some(values) = storage.load_collection(AGENTS_KEY) {
            self.agents = self.ingest_stored(values);
        }

        if self.agents.is_empty() {
            if let Some(raw_agents) = service.get_data(Source::Agents).and_then(Value::as_array) {
                self.ingest_snapshot(raw_agents);
            }
        }

        self.ensure_primary();
        self.loaded = true;
        log::info!(
            "loaded {} agents ({} invalid skipped)",
            self.agents.len(),
            self.skipped
        );
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn get(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn primary(&self) -> Option<&Agent> {
        self.agents.iter().find(|a| a.kind == AgentType::Primary)
    }

    pub fn subagents(&self) -> Vec<&Agent> {
        self.agents
            .iter()
            .filter(|a| a.kind == AgentType::Subagent)
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.agents
            .iter()
            .filter(|a| a.status == AgentStatus::Active)
            .count()
    }

    /// Register a subagent. The draft never becomes a primary; the
    /// primary is synthesized, not user-created.
    pub fn add(&mut self, storage: &WriteLayer, draft: AgentDraft) -> Option<Agent> {
        let agent = Agent {
            id: Uuid::new_v4().to_string(),
            name: draft.name.trim().to_string(),
            kind: AgentType::Subagent,
            status: draft.status.unwrap_or(AgentStatus::Idle),
            capabilities: draft.capabilities,
            last_active: time::now(),
        };

        if let Err(e) = agent.validate() {
            log::warn!("add agent rejected: {}", e);
            return None;
        }

        self.agents.push(agent.clone());
        self.persist(storage);
        log::info!("added subagent: {}", agent.name);
        Some(agent)
    }

    /// Shallow-merge a patch, committing only if the merged record
    /// still validates.
    pub fn update(&mut self, storage: &WriteLayer, id: &str, patch: AgentPatch) -> Option<Agent> {
        let Some(idx) = self.agents.iter().position(|a| a.id == id) else {
            log::info!("update agent: not found: {}", id);
            return None;
        };

        let mut agent = self.agents[idx].clone();
        if let Some(name) = patch.name {
            agent.name = name;
        }
        if let Some(status) = patch.status {
            agent.status = status;
        }
        if let Some(capabilities) = patch.capabilities {
            agent.capabilities = capabilities;
        }
        if let Some(last_active) = patch.last_active {
            agent.last_active = last_active;
        }

        if let Err(e) = agent.validate() {
            log::warn!("update agent rejected: {}", e);
            return None;
        }

        self.agents[idx] = agent.clone();
        self.persist(storage);
        log::info!("updated agent: {}", agent.name);
        Some(agent)
    }

    /// Remove a subagent. The primary agent is not deletable.
    pub fn delete(&mut self, storage: &WriteLayer, id: &str) -> bool {
        let Some(idx) = self.agents.iter().position(|a| a.id == id) else {
            return false;
        };
        if self.agents[idx].kind == AgentType::Primary {
            log::warn!("refusing to delete the primary agent");
            return false;
        }
        let removed = self.agents.remove(idx);
        self.persist(storage);
        log::info!("deleted subagent: {}", removed.name);
        true
    }

    fn ingest_snapshot(&mut self, raw_agents: &[Value]) {
        let now = time::now();
        for value in raw_agents {
            let parsed = serde_json::from_value::<RawAgent>(value.clone())
                .map_err(|e| e.to_string())
                .and_then(|r| r.normalize(now).map_err(|e| e.to_string()));
            match parsed {
                Ok(agent) => self.agents.push(agent),
                Err(e) => {
                    self.skipped += 1;
                    log::debug!("skipped invalid agent: {}", e);
                }
            }
        }
    }

    fn ingest_stored(&mut self, values: Vec<Value>) -> Vec<Agent> {
        let mut agents = Vec::new();
        for value in values {
            match serde_json::from_value::<Agent>(value)
                .map_err(|e| e.to_string())
                .and_then(|a| a.validate().map(|_| a).map_err(|e| e.to_string()))
            {
                Ok(agent) => agents.push(agent),
                Err(e) => {
                    self.skipped += 1;
                    log::debug!("write layer: skipped invalid agent: {}", e);
                }
            }
        }
        agents
    }

    /// The registry must always expose exactly one primary agent, even
    /// from an empty or subagent-only snapshot.
    fn ensure_primary(&mut self) {
        if self.primary().is_none() {
            self.agents.insert(0, Agent::default_primary(time::now()));
        }
    }

    fn persist(&self, storage: &WriteLayer) {
        if let Err(e) = storage.save_collection(AGENTS_KEY, &self.agents) {
            log::warn!("agent persist failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BeaconConfig;
    use crate::core::agent::PRIMARY_AGENT_ID;
    use serde_json::json;

    fn scratch_storage() -> WriteLayer {
        let dir = std::env::temp_dir().join(format!("beacon-agents-{}", Uuid::new_v4()));
        let layer = WriteLayer::new(dir);
        layer.ensure_dir().unwrap();
        layer
    }

    fn service_with_agents(agents: Value) -> DataService {
        let config = BeaconConfig {
            data_url: "http://127.0.0.1:9".to_string(),
            brain_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        };
        let mut service = DataService::new(&config).unwrap();
        service.apply_result(Source::Agents, Ok(agents));
        service
    }

    fn primary_count(store: &AgentStore) -> usize {
        store
            .agents()
            .iter()
            .filter(|a| a.kind == AgentType::Primary)
            .count()
    }

    #[test]
    fn empty_input_synthesizes_the_primary() {
        let service = service_with_agents(json!([]));
        let storage = scratch_storage();
        let mut store = AgentStore::new();
        store.load(&service, &storage);

        assert_eq!(primary_count(&store), 1);
        assert_eq!(store.primary().unwrap().id, PRIMARY_AGENT_ID);
    }

    #[test]
    fn existing_primary_is_not_duplicated() {
        let service = service_with_agents(json!([
            { "id": "p1", "name": "Flagship", "type": "primary", "status": "active" },
            { "id": "s1", "name": "Scout", "type": "subagent", "status": "idle" }
        ]));
        let storage = scratch_storage();
        let mut store = AgentStore::new();
        store.load(&service, &storage);

        assert_eq!(primary_count(&store), 1);
        assert_eq!(store.primary().unwrap().id, "p1");
        assert_eq!(store.subagents().len(), 1);
    }

    #[test]
    fn invalid_agents_are_skipped() {
        let service = service_with_agents(json!([
            { "id": "s1", "name": "Scout" },
            { "id": "s2" },
            { "name": "no id" }
        ]));
        let storage = scratch_storage();
        let mut store = AgentStore::new();
        store.load(&service, &storage);

        assert_eq!(store.skipped_count(), 2);
        assert_eq!(store.subagents().len(), 1);
    }

    #[test]
    fn add_creates_subagents_only() {
        let storage = scratch_storage();
        let service = service_with_agents(json!([]));
        let mut store = AgentStore::new();
        store.load(&service, &storage);

        let agent = store
            .add(
                &storage,
                AgentDraft {
                    name: "Scout".to_string(),
                    capabilities: vec!["mapping".to_string()],
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(agent.kind, AgentType::Subagent);
        assert_eq!(agent.status, AgentStatus::Idle);

        assert!(store
            .add(&storage, AgentDraft::default())
            .is_none()); // blank name rejected
    }

    #[test]
    fn update_rejects_invalid_merges() {
        let storage = scratch_storage();
        let service = service_with_agents(json!([]));
        let mut store = AgentStore::new();
        store.load(&service, &storage);
        let agent = store
            .add(
                &storage,
                AgentDraft {
                    name: "Scout".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();

        let updated = store
            .update(
                &storage,
                &agent.id,
                AgentPatch {
                    status: Some(AgentStatus::Active),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.status, AgentStatus::Active);

        // Blanking the name fails validation and changes nothing.
        assert!(store
            .update(
                &storage,
                &agent.id,
                AgentPatch {
                    name: Some(String::new()),
                    ..Default::default()
                },
            )
            .is_none());
        assert_eq!(store.get(&agent.id).unwrap().name, "Scout");
    }

    #[test]
    fn primary_is_not_deletable() {
        let storage = scratch_storage();
        let service = service_with_agents(json!([]));
        let mut store = AgentStore::new();
        store.load(&service, &storage);

        assert!(!store.delete(&storage, PRIMARY_AGENT_ID));
        assert_eq!(primary_count(&store), 1);

        let agent = store
            .add(
                &storage,
                AgentDraft {
                    name: "Scout".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(store.delete(&storage, &agent.id));
        assert!(!store.delete(&storage, &agent.id)); // second delete is a no-op
    }

    #[test]
    fn write_layer_edits_survive_reload() {
        let storage = scratch_storage();
        let service = service_with_agents(json!([
            { "id": "s1", "name": "FromSnapshot", "type": "subagent" }
        ]));

        let mut store = AgentStore::new();
        store.load(&service, &storage);
        store.add(
            &storage,
            AgentDraft {
                name: "LocalOnly".to_string(),
                ..Default::default()
            },
        );

        let mut reloaded = AgentStore::new();
        reloaded.load(&service, &storage);
        assert!(reloaded.agents().iter().any(|a| a.name == "LocalOnly"));
        assert_eq!(primary_count(&reloaded), 1);
    }
}
