use url::Url;

use crate::mcp::error::{BackendError, BackendResult};
use crate::mcp::script::{self, quote};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    #[default]
    Driving,
    Walking,
    Transit,
}

impl Transport {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "driving" => Some(Transport::Driving),
            "walking" => Some(Transport::Walking),
            "transit" => Some(Transport::Transit),
            _ => None,
        }
    }

    fn flag(&self) -> &'static str {
        match self {
            Transport::Driving => "d",
            Transport::Walking => "w",
            Transport::Transit => "r",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Driving => "driving",
            Transport::Walking => "walking",
            Transport::Transit => "transit",
        }
    }
}

/// Maps.app access. Maps has almost no scripting dictionary, so every
/// operation drives it through `maps://` URLs.
pub struct Maps;

impl Maps {
    pub fn new() -> Self {
        Self
    }

    pub async fn connect() -> BackendResult<Self> {
        script::probe("Maps", r#"id of application "Maps""#).await?;
        Ok(Self::new())
    }

    pub async fn search(&self, query: &str) -> BackendResult<Url> {
        let url = maps_url(&[("q", query)])?;
        self.open(&url).await?;
        Ok(url)
    }

    pub async fn pin(&self, name: &str, address: &str) -> BackendResult<Url> {
        let url = maps_url(&[("q", name), ("address", address)])?;
        self.open(&url).await?;
        Ok(url)
    }

    pub async fn directions(&self, from: &str, to: &str, transport: Transport) -> BackendResult<Url> {
        let url = maps_url(&[("saddr", from), ("daddr", to), ("dirflg", transport.flag())])?;
        self.open(&url).await?;
        Ok(url)
    }

    /// Open the location so it can be saved to Favorites from the place card.
    pub async fn save(&self, name: &str, address: &str) -> BackendResult<Url> {
        self.pin(name, address).await
    }

    /// Guides are not scriptable; open the Guides view.
    pub async fn show_guides(&self) -> BackendResult<Url> {
        let url = maps_url(&[("show", "guides")])?;
        self.open(&url).await?;
        Ok(url)
    }

    pub async fn open_for_guide(&self, address: &str) -> BackendResult<Url> {
        self.search(address).await
    }

    async fn open(&self, url: &Url) -> BackendResult<()> {
        let script = format!(
            "tell application \"Maps\" to activate\nopen location {}",
            quote(url.as_str())
        );
        script::run_applescript(&script).await.map(|_| ())
    }
}

fn maps_url(params: &[(&str, &str)]) -> BackendResult<Url> {
    if params.iter().any(|(_, v)| v.trim().is_empty()) {
        return Err(BackendError::Rejected("location must not be empty".to_string()));
    }
    // `maps:` URLs are not special schemes, so build from a template and
    // let `url` do the query encoding.
    let mut url = Url::parse("maps://")
        .map_err(|e| BackendError::Rejected(format!("invalid maps url: {e}")))?;
    url.query_pairs_mut().extend_pairs(params.iter());
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_url_encodes_query() {
        let url = maps_url(&[("q", "Café & Bar")]).unwrap();
        assert_eq!(url.scheme(), "maps");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("q".to_string(), "Café & Bar".to_string())]);
    }

    #[test]
    fn test_empty_location_is_rejected() {
        assert!(maps_url(&[("saddr", "Home"), ("daddr", " ")]).is_err());
    }

    #[test]
    fn test_transport_parse() {
        assert_eq!(Transport::parse("Walking"), Some(Transport::Walking));
        assert_eq!(Transport::parse("teleport"), None);
        assert_eq!(Transport::Transit.flag(), "r");
    }
}
