//! Client registry with per-role backend bindings
//!
//! The registry is an immutable name→backend table built once at start-up.
//! Each logical role (planning, response synthesis) binds to one backend and
//! model; the planner role may additionally fall through the remaining
//! registered backends in registration order when its primary fails.

use crate::backend::GenerationBackend;
use crate::completion::{GenerationRequest, GenerationResponse};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Logical generation duty bound to a backend + model by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationRole {
    /// Produces execution plans
    Planner,
    /// Synthesizes final answers
    Responder,
}

impl GenerationRole {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planner => "planner",
            Self::Responder => "responder",
        }
    }
}

impl fmt::Display for GenerationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role's backend + model binding
#[derive(Debug, Clone)]
pub struct RoleBinding {
    /// Registered backend name
    pub backend: String,
    /// Model identifier; empty selects the backend's default model
    pub model: String,
}

/// Builder for [`ClientRegistry`]
#[derive(Default)]
pub struct ClientRegistryBuilder {
    backends: Vec<(String, Arc<dyn GenerationBackend>)>,
    roles: HashMap<GenerationRole, RoleBinding>,
}

impl ClientRegistryBuilder {
    /// Register a backend under its name
    #[must_use]
    pub fn register(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.backends.push((backend.name().to_string(), backend));
        self
    }

    /// Bind a role to a registered backend and model
    #[must_use]
    pub fn bind(
        mut self,
        role: GenerationRole,
        backend: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        self.roles.insert(
            role,
            RoleBinding {
                backend: backend.into(),
                model: model.into(),
            },
        );
        self
    }

    /// Freeze the registry. Fails when a role binds to an unregistered
    /// backend or no backend is registered at all.
    pub fn build(self) -> Result<ClientRegistry> {
        if self.backends.is_empty() {
            return Err(Error::NotConfigured(
                "no generation backends registered".to_string(),
            ));
        }

        let order: Vec<String> = self.backends.iter().map(|(name, _)| name.clone()).collect();
        let backends: HashMap<String, Arc<dyn GenerationBackend>> =
            self.backends.into_iter().collect();

        for (role, binding) in &self.roles {
            if !backends.contains_key(&binding.backend) {
                return Err(Error::NotConfigured(format!(
                    "role {role} bound to unknown backend {:?}",
                    binding.backend
                )));
            }
        }

        Ok(ClientRegistry {
            backends,
            order,
            roles: self.roles,
        })
    }
}

/// Immutable lookup table of generation backends with role bindings
pub struct ClientRegistry {
    backends: HashMap<String, Arc<dyn GenerationBackend>>,
    order: Vec<String>,
    roles: HashMap<GenerationRole, RoleBinding>,
}

impl ClientRegistry {
    /// Start building a registry
    #[must_use]
    pub fn builder() -> ClientRegistryBuilder {
        ClientRegistryBuilder::default()
    }

    /// Look up a backend by name
    #[must_use]
    pub fn backend(&self, name: &str) -> Option<Arc<dyn GenerationBackend>> {
        self.backends.get(name).cloned()
    }

    /// Registered backend names, in registration order
    #[must_use]
    pub fn backend_names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// The binding for a role
    pub fn binding(&self, role: GenerationRole) -> Result<&RoleBinding> {
        self.roles
            .get(&role)
            .ok_or_else(|| Error::NotConfigured(format!("no backend bound for role {role}")))
    }

    /// Candidate (backend, model) pairs for a role: the bound backend first,
    /// then every other registered backend with its default model, in
    /// registration order.
    pub fn candidates(
        &self,
        role: GenerationRole,
    ) -> Result<Vec<(Arc<dyn GenerationBackend>, String)>> {
        let binding = self.binding(role)?;
        let primary = self
            .backends
            .get(&binding.backend)
            .cloned()
            .ok_or_else(|| Error::NotConfigured(binding.backend.clone()))?;

        let primary_model = if binding.model.is_empty() {
            primary.default_model().to_string()
        } else {
            binding.model.clone()
        };

        let mut out = vec![(primary, primary_model)];
        for name in &self.order {
            if name == &binding.backend {
                continue;
            }
            if let Some(backend) = self.backends.get(name) {
                out.push((backend.clone(), backend.default_model().to_string()));
            }
        }
        Ok(out)
    }

    /// Generate with the role's bound backend only
    pub async fn generate(
        &self,
        role: GenerationRole,
        request: GenerationRequest,
    ) -> Result<GenerationResponse> {
        let binding = self.binding(role)?;
        let backend = self
            .backends
            .get(&binding.backend)
            .ok_or_else(|| Error::NotConfigured(binding.backend.clone()))?;

        let mut request = request;
        if request.model.is_empty() {
            request.model = if binding.model.is_empty() {
                backend.default_model().to_string()
            } else {
                binding.model.clone()
            };
        }
        backend.generate(request).await
    }

    /// Generate with the role's candidate chain, falling through on failure.
    /// The last error is returned when every candidate fails.
    pub async fn generate_with_fallback(
        &self,
        role: GenerationRole,
        request: GenerationRequest,
    ) -> Result<GenerationResponse> {
        let candidates = self.candidates(role)?;
        let mut last_err = Error::NotConfigured(format!("no candidates for role {role}"));

        for (backend, model) in candidates {
            let mut attempt = request.clone();
            attempt.model = model;
            match backend.generate(attempt).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    warn!(
                        backend = backend.name(),
                        role = %role,
                        error = %err,
                        "generation backend failed, trying next candidate"
                    );
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;

    fn registry_with(roles: &[(GenerationRole, &str, &str)]) -> (Arc<MockBackend>, Arc<MockBackend>, ClientRegistry) {
        let first = Arc::new(MockBackend::named("first"));
        let second = Arc::new(MockBackend::named("second"));
        let mut builder = ClientRegistry::builder()
            .register(first.clone())
            .register(second.clone());
        for (role, backend, model) in roles {
            builder = builder.bind(*role, *backend, *model);
        }
        (first, second, builder.build().unwrap())
    }

    #[test]
    fn test_build_rejects_unknown_backend() {
        let result = ClientRegistry::builder()
            .register(Arc::new(MockBackend::named("only")))
            .bind(GenerationRole::Planner, "missing", "m")
            .build();
        assert!(matches!(result, Err(Error::NotConfigured(_))));
    }

    #[test]
    fn test_build_requires_backends() {
        let result = ClientRegistry::builder().build();
        assert!(matches!(result, Err(Error::NotConfigured(_))));
    }

    #[test]
    fn test_candidates_order() {
        let (_, _, registry) =
            registry_with(&[(GenerationRole::Planner, "second", "custom-model")]);

        let candidates = registry.candidates(GenerationRole::Planner).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].0.name(), "second");
        assert_eq!(candidates[0].1, "custom-model");
        assert_eq!(candidates[1].0.name(), "first");
        assert_eq!(candidates[1].1, "mock-model");
    }

    #[test]
    fn test_empty_binding_model_uses_backend_default() {
        let (_, _, registry) = registry_with(&[(GenerationRole::Responder, "first", "")]);
        let candidates = registry.candidates(GenerationRole::Responder).unwrap();
        assert_eq!(candidates[0].1, "mock-model");
    }

    #[test]
    fn test_unbound_role_errors() {
        let (_, _, registry) = registry_with(&[]);
        assert!(registry.binding(GenerationRole::Planner).is_err());
    }

    #[tokio::test]
    async fn test_fallback_moves_to_next_candidate() {
        let (first, second, registry) =
            registry_with(&[(GenerationRole::Planner, "first", "m1")]);
        first.push_error(Error::Api("down".to_string()));
        second.push_response("from second");

        let response = registry
            .generate_with_fallback(GenerationRole::Planner, GenerationRequest::default())
            .await
            .unwrap();
        assert_eq!(response.content, "from second");
        assert_eq!(first.request_count(), 1);
        assert_eq!(second.request_count(), 1);
    }

    #[tokio::test]
    async fn test_fallback_exhaustion_returns_last_error() {
        let (first, second, registry) =
            registry_with(&[(GenerationRole::Planner, "first", "m1")]);
        first.push_error(Error::Api("one".to_string()));
        second.push_error(Error::Api("two".to_string()));

        let err = registry
            .generate_with_fallback(GenerationRole::Planner, GenerationRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api(msg) if msg == "two"));
    }

    #[tokio::test]
    async fn test_primary_generate_does_not_fall_back() {
        let (first, second, registry) =
            registry_with(&[(GenerationRole::Responder, "first", "m1")]);
        first.push_error(Error::Api("down".to_string()));
        second.push_response("unused");

        let result = registry
            .generate(GenerationRole::Responder, GenerationRequest::default())
            .await;
        assert!(result.is_err());
        assert_eq!(second.request_count(), 0);
    }
}
