//! Capability Registry

use crate::{
    CapabilityKind, CapabilityMetadata, CurrencyMeta, CurrencyPlugin, DecoderMeta, DecoderPlugin,
    ExprFuncMeta, ExprFuncPlugin, ExprVarMeta, ExprVarPlugin, RegistryError, TraitMeta, TraitPlugin,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A plugin paired with the metadata it reported at registration
pub struct Registered<M, P: ?Sized> {
    meta: M,
    plugin: Arc<P>,
}

impl<M, P: ?Sized> Registered<M, P> {
    pub fn meta(&self) -> &M {
        &self.meta
    }

    pub fn plugin(&self) -> &P {
        &self.plugin
    }

    /// Owned handle, for work that outlives the registry borrow
    pub fn shared(&self) -> Arc<P> {
        Arc::clone(&self.plugin)
    }
}

impl<M: Clone, P: ?Sized> Clone for Registered<M, P> {
    fn clone(&self) -> Self {
        Self { meta: self.meta.clone(), plugin: Arc::clone(&self.plugin) }
    }
}

pub type RegisteredDecoder = Registered<DecoderMeta, dyn DecoderPlugin>;
pub type RegisteredTrait = Registered<TraitMeta, dyn TraitPlugin>;
pub type RegisteredCurrency = Registered<CurrencyMeta, dyn CurrencyPlugin>;
pub type RegisteredExprVar = Registered<ExprVarMeta, dyn ExprVarPlugin>;
pub type RegisteredExprFunc = Registered<ExprFuncMeta, dyn ExprFuncPlugin>;

/// One plugin awaiting registration
#[derive(Clone)]
pub enum Capability {
    Decoder(Arc<dyn DecoderPlugin>),
    Trait(Arc<dyn TraitPlugin>),
    CurrencyProvider(Arc<dyn CurrencyPlugin>),
    ExprVar(Arc<dyn ExprVarPlugin>),
    ExprFunc(Arc<dyn ExprFuncPlugin>),
}

impl Capability {
    pub fn decoder<D: DecoderPlugin + 'static>(d: D) -> Self {
        Self::Decoder(Arc::new(d))
    }

    pub fn trait_<T: TraitPlugin + 'static>(t: T) -> Self {
        Self::Trait(Arc::new(t))
    }

    pub fn currency<C: CurrencyPlugin + 'static>(c: C) -> Self {
        Self::CurrencyProvider(Arc::new(c))
    }

    pub fn expr_var<V: ExprVarPlugin + 'static>(v: V) -> Self {
        Self::ExprVar(Arc::new(v))
    }

    pub fn expr_func<F: ExprFuncPlugin + 'static>(f: F) -> Self {
        Self::ExprFunc(Arc::new(f))
    }

    pub fn kind(&self) -> CapabilityKind {
        match self {
            Self::Decoder(_) => CapabilityKind::Decoder,
            Self::Trait(_) => CapabilityKind::Trait,
            Self::CurrencyProvider(_) => CapabilityKind::CurrencyProvider,
            Self::ExprVar(_) => CapabilityKind::ExprVar,
            Self::ExprFunc(_) => CapabilityKind::ExprFunc,
        }
    }
}

/// Outcome of a batch registration
#[derive(Debug, Default)]
pub struct LoadReport {
    pub registered: Vec<CapabilityMetadata>,
    pub rejected: Vec<RegistryError>,
}

impl LoadReport {
    pub fn ids(&self, kind: CapabilityKind) -> Vec<&str> {
        self.registered.iter().filter(|m| m.kind == kind).map(|m| m.id.as_str()).collect()
    }

    pub fn total_loaded(&self) -> usize {
        self.registered.len()
    }

    pub fn has_errors(&self) -> bool {
        !self.rejected.is_empty()
    }

    pub fn merge(&mut self, other: LoadReport) {
        self.registered.extend(other.registered);
        self.rejected.extend(other.rejected);
    }
}

/// Central capability registry.
///
/// Populated once at startup, read-only afterwards. Every table keeps
/// registration order; lookups are case-insensitive.
#[derive(Default)]
pub struct CapabilityRegistry {
    decoders: Vec<RegisteredDecoder>,
    traits: Vec<RegisteredTrait>,
    currencies: Vec<RegisteredCurrency>,
    expr_vars: Vec<RegisteredExprVar>,
    expr_funcs: Vec<RegisteredExprFunc>,
    // lowercased decoder id or alias -> index into `decoders`
    decoder_names: HashMap<String, usize>,
    // (kind, normalized id) -> index into that kind's table
    index: HashMap<(CapabilityKind, String), usize>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, capability: Capability) -> Result<(), RegistryError> {
        self.insert(capability).map(|_| ())
    }

    fn insert(&mut self, capability: Capability) -> Result<CapabilityMetadata, RegistryError> {
        let metadata = match capability {
            Capability::Decoder(p) => self.add_decoder(p)?,
            Capability::Trait(p) => self.add_trait(p)?,
            Capability::CurrencyProvider(p) => self.add_currency(p)?,
            Capability::ExprVar(p) => self.add_expr_var(p)?,
            Capability::ExprFunc(p) => self.add_expr_func(p)?,
        };
        debug!(kind = %metadata.kind, id = %metadata.id, "registered capability");
        Ok(metadata)
    }

    /// Register a batch, skipping (and logging) every entry that is rejected.
    pub fn register_all<I>(&mut self, capabilities: I) -> LoadReport
    where
        I: IntoIterator<Item = Capability>,
    {
        let mut report = LoadReport::default();
        for capability in capabilities {
            let kind = capability.kind();
            match self.insert(capability) {
                Ok(meta) => report.registered.push(meta),
                Err(e) => {
                    warn!(kind = %kind, error = %e, "skipping capability");
                    report.rejected.push(e);
                }
            }
        }
        info!(
            loaded = report.total_loaded(),
            rejected = report.rejected.len(),
            "capability load complete"
        );
        report
    }

    pub fn with_decoder<D: DecoderPlugin + 'static>(mut self, d: D) -> Result<Self, RegistryError> {
        self.register(Capability::decoder(d))?;
        Ok(self)
    }

    pub fn with_trait<T: TraitPlugin + 'static>(mut self, t: T) -> Result<Self, RegistryError> {
        self.register(Capability::trait_(t))?;
        Ok(self)
    }

    pub fn with_currency<C: CurrencyPlugin + 'static>(mut self, c: C) -> Result<Self, RegistryError> {
        self.register(Capability::currency(c))?;
        Ok(self)
    }

    pub fn with_expr_var<V: ExprVarPlugin + 'static>(mut self, v: V) -> Result<Self, RegistryError> {
        self.register(Capability::expr_var(v))?;
        Ok(self)
    }

    pub fn with_expr_func<F: ExprFuncPlugin + 'static>(mut self, f: F) -> Result<Self, RegistryError> {
        self.register(Capability::expr_func(f))?;
        Ok(self)
    }

    // ------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------

    fn add_decoder(&mut self, plugin: Arc<dyn DecoderPlugin>) -> Result<CapabilityMetadata, RegistryError> {
        let meta = plugin.meta();
        let kind = CapabilityKind::Decoder;
        require(kind, &meta.id, "id", &meta.id)?;
        require(kind, &meta.id, "name", &meta.name)?;
        let key = normalize_id(&meta.id);

        if self.index.contains_key(&(kind, key.clone())) {
            return Err(RegistryError::DuplicateId { kind, id: meta.id });
        }
        if let Some(&existing) = self.decoder_names.get(&key) {
            return Err(RegistryError::AliasCollision {
                id: meta.id.clone(),
                alias: meta.id,
                existing: self.decoders[existing].meta.id.clone(),
            });
        }

        let mut aliases: Vec<String> = Vec::new();
        for alias in &meta.aliases {
            if alias.trim().is_empty() {
                return Err(RegistryError::invalid(kind, &meta.id, "empty alias"));
            }
            let alias_key = alias.trim().to_lowercase();
            if alias_key == key || aliases.contains(&alias_key) {
                continue;
            }
            if let Some(&existing) = self.decoder_names.get(&alias_key) {
                return Err(RegistryError::AliasCollision {
                    id: meta.id.clone(),
                    alias: alias.clone(),
                    existing: self.decoders[existing].meta.id.clone(),
                });
            }
            aliases.push(alias_key);
        }

        let slot = self.decoders.len();
        self.decoder_names.insert(key.clone(), slot);
        for alias in aliases {
            self.decoder_names.insert(alias, slot);
        }
        self.index.insert((kind, key), slot);
        let capability = meta.capability();
        self.decoders.push(Registered { meta, plugin });
        Ok(capability)
    }

    fn add_trait(&mut self, plugin: Arc<dyn TraitPlugin>) -> Result<CapabilityMetadata, RegistryError> {
        let meta = plugin.meta();
        let kind = CapabilityKind::Trait;
        require(kind, &meta.id, "id", &meta.id)?;
        require(kind, &meta.id, "name", &meta.name)?;
        if meta.value_types.is_empty() {
            return Err(RegistryError::invalid(kind, &meta.id, "value_types is empty"));
        }
        self.claim(kind, &meta.id, normalize_id(&meta.id), self.traits.len())?;
        let capability = meta.capability();
        self.traits.push(Registered { meta, plugin });
        Ok(capability)
    }

    fn add_currency(&mut self, plugin: Arc<dyn CurrencyPlugin>) -> Result<CapabilityMetadata, RegistryError> {
        let mut meta = plugin.meta();
        let kind = CapabilityKind::CurrencyProvider;
        require(kind, &meta.code, "code", &meta.code)?;
        if meta.code.trim().chars().any(char::is_whitespace) {
            return Err(RegistryError::invalid(kind, &meta.code, "code contains whitespace"));
        }
        require(kind, &meta.code, "symbol", &meta.symbol)?;
        require(kind, &meta.code, "name", &meta.name)?;
        meta.code = normalize_code(&meta.code);
        self.claim(kind, &meta.code, meta.code.clone(), self.currencies.len())?;
        let capability = meta.capability();
        self.currencies.push(Registered { meta, plugin });
        Ok(capability)
    }

    fn add_expr_var(&mut self, plugin: Arc<dyn ExprVarPlugin>) -> Result<CapabilityMetadata, RegistryError> {
        let meta = plugin.meta();
        let kind = CapabilityKind::ExprVar;
        require_identifier(kind, &meta.id)?;
        self.claim(kind, &meta.id, normalize_id(&meta.id), self.expr_vars.len())?;
        let capability = meta.capability();
        self.expr_vars.push(Registered { meta, plugin });
        Ok(capability)
    }

    fn add_expr_func(&mut self, plugin: Arc<dyn ExprFuncPlugin>) -> Result<CapabilityMetadata, RegistryError> {
        let meta = plugin.meta();
        let kind = CapabilityKind::ExprFunc;
        require_identifier(kind, &meta.id)?;
        if meta.args.iter().any(|a| a.name.trim().is_empty()) {
            return Err(RegistryError::invalid(kind, &meta.id, "unnamed argument"));
        }
        self.claim(kind, &meta.id, normalize_id(&meta.id), self.expr_funcs.len())?;
        let capability = meta.capability();
        self.expr_funcs.push(Registered { meta, plugin });
        Ok(capability)
    }

    fn claim(&mut self, kind: CapabilityKind, id: &str, key: String, slot: usize) -> Result<(), RegistryError> {
        if self.index.contains_key(&(kind, key.clone())) {
            return Err(RegistryError::DuplicateId { kind, id: id.to_string() });
        }
        self.index.insert((kind, key), slot);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn decoders(&self) -> &[RegisteredDecoder] {
        &self.decoders
    }

    pub fn traits(&self) -> &[RegisteredTrait] {
        &self.traits
    }

    pub fn currencies(&self) -> &[RegisteredCurrency] {
        &self.currencies
    }

    pub fn expr_vars(&self) -> &[RegisteredExprVar] {
        &self.expr_vars
    }

    pub fn expr_funcs(&self) -> &[RegisteredExprFunc] {
        &self.expr_funcs
    }

    /// Resolve a decoder id or alias to the decoder's registered id.
    pub fn lookup_by_alias(&self, name: &str) -> Option<&str> {
        self.decoder_names
            .get(&normalize_id(name))
            .map(|&i| self.decoders[i].meta.id.as_str())
    }

    pub fn currency(&self, code: &str) -> Option<&RegisteredCurrency> {
        self.slot(CapabilityKind::CurrencyProvider, &normalize_code(code))
            .map(|i| &self.currencies[i])
    }

    pub fn expr_var(&self, id: &str) -> Option<&RegisteredExprVar> {
        self.slot(CapabilityKind::ExprVar, &normalize_id(id)).map(|i| &self.expr_vars[i])
    }

    pub fn expr_func(&self, id: &str) -> Option<&RegisteredExprFunc> {
        self.slot(CapabilityKind::ExprFunc, &normalize_id(id)).map(|i| &self.expr_funcs[i])
    }

    fn slot(&self, kind: CapabilityKind, key: &str) -> Option<usize> {
        self.index.get(&(kind, key.to_string())).copied()
    }

    /// All registrations of one kind, in registration order
    pub fn describe(&self, kind: CapabilityKind) -> Vec<CapabilityMetadata> {
        match kind {
            CapabilityKind::Decoder => self.decoders.iter().map(|r| r.meta.capability()).collect(),
            CapabilityKind::Trait => self.traits.iter().map(|r| r.meta.capability()).collect(),
            CapabilityKind::CurrencyProvider => self.currencies.iter().map(|r| r.meta.capability()).collect(),
            CapabilityKind::ExprVar => self.expr_vars.iter().map(|r| r.meta.capability()).collect(),
            CapabilityKind::ExprFunc => self.expr_funcs.iter().map(|r| r.meta.capability()).collect(),
        }
    }

    pub fn len_of(&self, kind: CapabilityKind) -> usize {
        match kind {
            CapabilityKind::Decoder => self.decoders.len(),
            CapabilityKind::Trait => self.traits.len(),
            CapabilityKind::CurrencyProvider => self.currencies.len(),
            CapabilityKind::ExprVar => self.expr_vars.len(),
            CapabilityKind::ExprFunc => self.expr_funcs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Ids of the given kind that look like `name`, best match first
    pub fn find_similar(&self, kind: CapabilityKind, name: &str) -> Vec<String> {
        let name_lower = name.to_lowercase();
        let mut matches: Vec<(String, usize)> = self
            .describe(kind)
            .into_iter()
            .filter_map(|meta| {
                let score = similarity_score(&name_lower, &meta.id.to_lowercase());
                (score > 0).then_some((meta.id, score))
            })
            .collect();

        // Stable: equal scores keep registration order
        matches.sort_by(|a, b| b.1.cmp(&a.1));
        matches.into_iter().map(|(id, _)| id).collect()
    }
}

fn normalize_id(id: &str) -> String {
    id.trim().to_lowercase()
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn require(kind: CapabilityKind, id: &str, field: &str, value: &str) -> Result<(), RegistryError> {
    if value.trim().is_empty() {
        return Err(RegistryError::invalid(kind, id, format!("{} is empty", field)));
    }
    Ok(())
}

/// Expression names must be callable by name: a letter or `_`, then
/// letters, digits or `_`.
fn require_identifier(kind: CapabilityKind, id: &str) -> Result<(), RegistryError> {
    require(kind, id, "id", id)?;
    let mut chars = id.chars();
    let head_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !head_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(RegistryError::invalid(kind, id, "id is not a valid identifier"));
    }
    Ok(())
}

/// Calculate similarity score between two strings
fn similarity_score(query: &str, candidate: &str) -> usize {
    let mut score = 0;

    if candidate.starts_with(query) {
        score += 100;
    } else if candidate.contains(query) {
        score += 50;
    } else if query.contains(candidate) {
        score += 30;
    }

    let query_chars: std::collections::HashSet<char> = query.chars().collect();
    let candidate_chars: std::collections::HashSet<char> = candidate.chars().collect();
    let common = query_chars.intersection(&candidate_chars).count();
    score += common * 2;

    let len_diff = query.len().abs_diff(candidate.len());
    if len_diff < 5 && score > 0 {
        score += 5 - len_diff;
    }

    score
}
