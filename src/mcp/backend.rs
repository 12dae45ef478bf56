use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::mcp::backends::{
    calendar::Calendar, contacts::Contacts, mail::Mail, maps::Maps, messages::Messages,
    notes::Notes, reminders::Reminders, web_search::WebSearch,
};
use crate::mcp::error::BackendResult;
use crate::shared::config::AppConfig;

/// Fixed set of automation backends. Used as the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BackendId {
    Contacts,
    Notes,
    Messages,
    Mail,
    Reminders,
    Calendar,
    Maps,
    WebSearch,
}

impl BackendId {
    pub const ALL: [BackendId; 8] = [
        BackendId::Contacts,
        BackendId::Notes,
        BackendId::Messages,
        BackendId::Mail,
        BackendId::Reminders,
        BackendId::Calendar,
        BackendId::Maps,
        BackendId::WebSearch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Contacts => "contacts",
            BackendId::Notes => "notes",
            BackendId::Messages => "messages",
            BackendId::Mail => "mail",
            BackendId::Reminders => "reminders",
            BackendId::Calendar => "calendar",
            BackendId::Maps => "maps",
            BackendId::WebSearch => "webSearch",
        }
    }

    /// Position in `ALL`; slot index for per-backend tables.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! capabilities {
    ($($variant:ident => $ty:ty),+ $(,)?) => {
        /// A loaded backend instance. One variant per `BackendId`, each a
        /// shared handle to its concrete capability.
        #[derive(Clone)]
        pub enum Backend {
            $($variant(Arc<$ty>),)+
        }

        impl Backend {
            pub fn id(&self) -> BackendId {
                match self {
                    $(Backend::$variant(_) => BackendId::$variant,)+
                }
            }
        }

        $(
            impl Capability for $ty {
                const ID: BackendId = BackendId::$variant;

                fn from_backend(backend: Backend) -> Option<Arc<Self>> {
                    match backend {
                        Backend::$variant(inner) => Some(inner),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }
        )+
    };
}

/// Ties a concrete capability type to the identifier that produces it, so
/// typed lookups never go through an untyped handle.
pub trait Capability: Send + Sync + Sized + 'static {
    const ID: BackendId;

    fn from_backend(backend: Backend) -> Option<Arc<Self>>;
}

capabilities! {
    Contacts => Contacts,
    Notes => Notes,
    Messages => Messages,
    Mail => Mail,
    Reminders => Reminders,
    Calendar => Calendar,
    Maps => Maps,
    WebSearch => WebSearch,
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Backend").field(&self.id()).finish()
    }
}

/// Creates backend instances. Called at most once per in-flight load.
#[async_trait]
pub trait Initializer: Send + Sync {
    async fn initialize(&self, id: BackendId) -> BackendResult<Backend>;
}

/// Production initializer: builds each backend and runs its access probe.
/// The probe is what may sit on an OS permission prompt.
pub struct AutomationInitializer {
    config: Arc<AppConfig>,
}

impl AutomationInitializer {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Initializer for AutomationInitializer {
    async fn initialize(&self, id: BackendId) -> BackendResult<Backend> {
        let backend = match id {
            BackendId::Contacts => Backend::Contacts(Arc::new(Contacts::connect().await?)),
            BackendId::Notes => Backend::Notes(Arc::new(Notes::connect().await?)),
            BackendId::Messages => Backend::Messages(Arc::new(Messages::connect().await?)),
            BackendId::Mail => Backend::Mail(Arc::new(
                Mail::connect(self.config.mail.clone()).await?,
            )),
            BackendId::Reminders => Backend::Reminders(Arc::new(Reminders::connect().await?)),
            BackendId::Calendar => Backend::Calendar(Arc::new(Calendar::connect().await?)),
            BackendId::Maps => Backend::Maps(Arc::new(Maps::connect().await?)),
            BackendId::WebSearch => Backend::WebSearch(Arc::new(WebSearch::connect(
                self.config.web_search.clone(),
            )?)),
        };
        Ok(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_position() {
        for (i, id) in BackendId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
        }
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(BackendId::WebSearch.to_string(), "webSearch");
        assert_eq!(BackendId::Mail.as_str(), "mail");
    }
}
