use super::types::*;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tower::Service;

/// Pluggable authentication/authorization provider.
pub trait AuthProvider: Send + Sync {
    /// Unique name of this provider.
    fn name(&self) -> &'static str;

    /// Verify credentials; returns context on success.
    fn authenticate(
        &self,
        meta: &CommandMeta,
        auth: Option<&AuthPayload>,
    ) -> Result<AuthContext, AuthError>;

    /// Optional authorization using the command label.
    ///
    /// # Default Implementation
    ///
    /// Returns `Err(AuthError::Unauthorized)` (fail-closed). Implementors MUST override this
    /// to explicitly grant access.
    fn authorize(
        &self,
        _ctx: &AuthContext,
        _label: &str,
        _meta: &CommandMeta,
    ) -> Result<(), AuthError> {
        Err(AuthError::Unauthorized("default authorize denies all".into()))
    }
}

/// Registry that tries providers in order.
#[derive(Clone)]
pub struct AuthRegistry {
    providers: Vec<Arc<dyn AuthProvider>>,
    mode: AuthMode,
}

/// Strategy for combining multiple auth providers.
#[derive(Clone, Copy, Debug)]
pub enum AuthMode {
    /// First provider that authenticates wins.
    First,
    /// All providers must succeed; principal is taken from the first successful provider and
    /// attributes from subsequent providers are merged (later attributes overwrite earlier keys).
    All,
}

impl AuthRegistry {
    /// Create a new registry with the given mode.
    pub fn new(mode: AuthMode) -> Self {
        Self { providers: Vec::new(), mode }
    }

    /// Register an auth provider.
    pub fn register(&mut self, provider: Arc<dyn AuthProvider>) {
        self.providers.push(provider);
    }

    /// Authenticate a command envelope using registered providers.
    pub fn authenticate<C: CommandLabel>(
        &self,
        env: &CommandEnvelope<C>,
    ) -> Result<AuthContext, AuthError> {
        match self.mode {
            AuthMode::First => self.authenticate_first(env),
            AuthMode::All => self.authenticate_all(env),
        }
    }

    fn authenticate_first<C: CommandLabel>(
        &self,
        env: &CommandEnvelope<C>,
    ) -> Result<AuthContext, AuthError> {
        let mut last_err = None;
        for p in &self.providers {
            match p.authenticate(&env.meta, env.auth.as_ref()) {
                Ok(ctx) => {
                    // If a provider authenticates but denies authorization, stop immediately
                    // to prevent later providers from overriding an explicit deny.
                    match p.authorize(&ctx, env.cmd.label(), &env.meta) {
                        Ok(()) => return Ok(ctx),
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or(AuthError::Unauthenticated("no providers".into())))
    }

    fn authenticate_all<C: CommandLabel>(
        &self,
        env: &CommandEnvelope<C>,
    ) -> Result<AuthContext, AuthError> {
        let authed = self.authenticate_many(env)?;
        self.authorize_all(env, &authed)?;
        self.merge_contexts(authed)
    }

    fn authenticate_many<C: CommandLabel>(
        &self,
        env: &CommandEnvelope<C>,
    ) -> Result<Vec<AuthContext>, AuthError> {
        let mut results = Vec::new();
        for p in &self.providers {
            let ctx = p.authenticate(&env.meta, env.auth.as_ref())?;
            results.push(ctx);
        }
        Ok(results)
    }

    fn authorize_all<C: CommandLabel>(
        &self,
        env: &CommandEnvelope<C>,
        contexts: &[AuthContext],
    ) -> Result<(), AuthError> {
        for (p, ctx) in self.providers.iter().zip(contexts.iter()) {
            p.authorize(ctx, env.cmd.label(), &env.meta)?;
        }
        Ok(())
    }

    fn merge_contexts(&self, contexts: Vec<AuthContext>) -> Result<AuthContext, AuthError> {
        let mut iter = contexts.into_iter();
        let mut base = iter
            .next()
            .ok_or_else(|| AuthError::Unauthenticated("no providers".into()))?;
        for ctx in iter {
            base.attributes.extend(ctx.attributes.into_iter());
        }
        Ok(base)
    }
}

/// Authorization layer wraps an inner service and preserves auth registry for later use.
///
/// Generic over the command payload type `C`, defaulting to the dynamic
/// `Box<dyn Command>` transports use.
pub struct AuthorizationLayer<C = Box<dyn super::command::Command>> {
    registry: Arc<AuthRegistry>,
    _marker: PhantomData<fn() -> C>,
}

impl<C> Clone for AuthorizationLayer<C> {
    fn clone(&self) -> Self {
        Self { registry: self.registry.clone(), _marker: PhantomData }
    }
}

impl<C> AuthorizationLayer<C> {
    /// Create a new authorization layer with the given registry.
    pub fn new(registry: AuthRegistry) -> Self {
        Self { registry: Arc::new(registry), _marker: PhantomData }
    }
}

/// Service that applies authorization checks before forwarding commands.
pub struct AuthorizationService<S, C = Box<dyn super::command::Command>> {
    inner: S,
    registry: Arc<AuthRegistry>,
    _marker: PhantomData<fn() -> C>,
}

impl<S: Clone, C> Clone for AuthorizationService<S, C> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), registry: self.registry.clone(), _marker: PhantomData }
    }
}

impl<S, C> tower_layer::Layer<S> for AuthorizationLayer<C> {
    type Service = AuthorizationService<S, C>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthorizationService { inner, registry: self.registry.clone(), _marker: PhantomData }
    }
}

impl<S, C> Service<CommandEnvelope<C>> for AuthorizationService<S, C>
where
    C: CommandLabel + Clone + Send + 'static,
    S: Service<CommandEnvelope<C>, Response = CommandResult, Error = CommandError>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    type Response = CommandResult;
    type Error = CommandError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), CommandError>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: CommandEnvelope<C>) -> Self::Future {
        let registry = self.registry.clone();
        let inner = self.inner.clone();
        Box::pin(async move {
            registry.authenticate(&req).map_err(CommandError::Auth)?;
            let mut inner = inner;
            inner.call(req).await
        })
    }
}

/// Passthrough provider (dev/testing).
///
/// # ⚠️ SECURITY WARNING
///
/// This provider grants access to **everyone** as "anonymous".
/// **DO NOT USE IN PRODUCTION**. It effectively disables authentication.
pub struct PassthroughAuth;
impl AuthProvider for PassthroughAuth {
    fn name(&self) -> &'static str {
        "passthrough"
    }
    fn authenticate(
        &self,
        _meta: &CommandMeta,
        _auth: Option<&AuthPayload>,
    ) -> Result<AuthContext, AuthError> {
        Ok(AuthContext {
            principal: "anonymous".into(),
            provider: self.name(),
            attributes: HashMap::new(),
        })
    }

    fn authorize(
        &self,
        _ctx: &AuthContext,
        _label: &str,
        _meta: &CommandMeta,
    ) -> Result<(), AuthError> {
        Ok(())
    }
}
