use super::{
    architecture::Architecture,
    fetcher::{fetch_bytes, FetchError},
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};
use url::Url;

/// A single downloadable compiler build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Build {
    pub path: String,
    pub url: Url,
    pub version: String,
    pub long_version: String,
    pub commit: Option<String>,
    pub prerelease: Option<String>,
    pub keccak256: Option<String>,
    pub sha256: Option<String>,
    pub urls: Vec<String>,
}

/// Builds of a single architecture, indexed by both long and short versions.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    by_long_version: HashMap<String, Arc<Build>>,
    by_version: HashMap<String, Arc<Build>>,
}

impl Catalog {
    fn from_list(list_url: &Url, list: json::List) -> Result<Self, FetchError> {
        let mut catalog = Catalog::default();
        for build in list.builds {
            let build = Arc::new(build.into_build(list_url)?);
            catalog
                .by_long_version
                .insert(build.long_version.clone(), build.clone());

            // releases win over nightlies sharing the short version
            match catalog.by_version.get(&build.version) {
                Some(existing) if existing.prerelease.is_none() => {}
                Some(_) if build.prerelease.is_some() => {}
                _ => {
                    catalog.by_version.insert(build.version.clone(), build);
                }
            }
        }
        Ok(catalog)
    }

    pub fn by_long_version(&self, long_version: &str) -> Option<Arc<Build>> {
        self.by_long_version.get(long_version).cloned()
    }

    pub fn by_version(&self, version: &str) -> Option<Arc<Build>> {
        self.by_version.get(version).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_long_version.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_long_version.is_empty()
    }
}

/// Lazily fetched manifests of every architecture.
///
/// Each manifest is requested at most once per successful fetch and kept
/// for the lifetime of the instance. Failed fetches are not remembered.
pub struct ReleaseCatalog {
    client: reqwest::Client,
    base_url: Url,
    list_urls: HashMap<Architecture, Url>,
    catalogs: parking_lot::Mutex<HashMap<Architecture, Arc<OnceCell<Arc<Catalog>>>>>,
}

impl ReleaseCatalog {
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self {
            client,
            base_url,
            list_urls: HashMap::new(),
            catalogs: Default::default(),
        }
    }

    /// Overrides the manifest location of the given architecture.
    pub fn with_list_url(mut self, architecture: Architecture, list_url: Url) -> Self {
        self.list_urls.insert(architecture, list_url);
        self
    }

    pub fn list_url(&self, architecture: Architecture) -> Result<Url, FetchError> {
        match self.list_urls.get(&architecture) {
            Some(url) => Ok(url.clone()),
            None => Ok(architecture.list_url(&self.base_url)?),
        }
    }

    pub async fn get(&self, architecture: Architecture) -> Result<Arc<Catalog>, FetchError> {
        let cell = {
            let mut catalogs = self.catalogs.lock();
            Arc::clone(catalogs.entry(architecture).or_default())
        };
        cell.get_or_try_init(|| self.fetch(architecture))
            .await
            .cloned()
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch(&self, architecture: Architecture) -> Result<Arc<Catalog>, FetchError> {
        let list_url = self.list_url(architecture)?;
        let bytes = fetch_bytes(&self.client, &list_url).await?;
        let list: json::List =
            serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_slice(&bytes))
                .map_err(|source| FetchError::Manifest {
                    url: list_url.clone(),
                    source,
                })?;
        debug!("found list json file of len = {}", list.builds.len());
        let catalog = Catalog::from_list(&list_url, list)?;
        Ok(Arc::new(catalog))
    }
}

mod json {
    use super::Build;
    use serde::Deserialize;
    use url::Url;

    #[derive(Debug, Deserialize)]
    pub struct List {
        pub builds: Vec<FileInfo>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct FileInfo {
        pub path: String,
        pub version: String,
        pub long_version: String,
        #[serde(default)]
        pub build: Option<String>,
        #[serde(default)]
        pub prerelease: Option<String>,
        #[serde(default)]
        pub keccak256: Option<String>,
        #[serde(default)]
        pub sha256: Option<String>,
        #[serde(default)]
        pub urls: Vec<String>,
    }

    impl FileInfo {
        pub fn into_build(self, list_url: &Url) -> Result<Build, url::ParseError> {
            // list_url ends with `.../list.json` but join() will replace this with `path`;
            // absolute paths replace the whole url
            let url = list_url.join(&self.path)?;
            let commit = self
                .build
                .map(|build| build.trim_start_matches("commit.").to_string());
            Ok(Build {
                path: self.path,
                url,
                version: self.version,
                long_version: self.long_version,
                commit,
                prerelease: self.prerelease,
                keccak256: self.keccak256,
                sha256: self.sha256,
                urls: self.urls,
            })
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    pub const LINUX_LIST_JSON: &str = r#"{
        "builds": [
            {
                "path": "solc-linux-amd64-v0.8.9+commit.e5eed63a",
                "version": "0.8.9",
                "build": "commit.e5eed63a",
                "longVersion": "0.8.9+commit.e5eed63a",
                "keccak256": "0x2c02f1ec6d6e4a2f2ab5a1a7b4f1a6c0e5c9b8d7e6f5a4b3c2d1e0f9a8b7c6d5",
                "sha256": "0xf851f11fad37496baabaf8d6cb5c057ca0d9754fddb7a351ab580d7fd728cb94",
                "urls": ["dweb:/ipfs/QmYXrx5B1iuSCmqHPPnzjmPHLUu3mS6ScA7Ly3zXjcmGFN"]
            },
            {
                "path": "https://github.com/ethereum/solc-bin/raw/gh-pages/linux-amd64/solc-linux-amd64-v0.8.10+commit.fc410830",
                "version": "0.8.10",
                "build": "commit.fc410830",
                "longVersion": "0.8.10+commit.fc410830",
                "sha256": "0xc7effacf28b9d64495f81b75228fbf4266ac0ec87e8f1adc489ddd8a4dd06d89"
            }
        ]
    }"#;

    pub const WASM_LIST_JSON: &str = r#"{
        "builds": [
            {
                "path": "soljson-v0.8.9-nightly.2021.9.10+commit.d0d14a0a.js",
                "version": "0.8.9",
                "prerelease": "nightly.2021.9.10",
                "build": "commit.d0d14a0a",
                "longVersion": "0.8.9-nightly.2021.9.10+commit.d0d14a0a"
            },
            {
                "path": "soljson-v0.8.9+commit.e5eed63a.js",
                "version": "0.8.9",
                "build": "commit.e5eed63a",
                "longVersion": "0.8.9+commit.e5eed63a"
            },
            {
                "path": "soljson-v0.8.9-nightly.2021.9.29+commit.a1b2c3d4.js",
                "version": "0.8.9",
                "prerelease": "nightly.2021.9.29",
                "build": "commit.a1b2c3d4",
                "longVersion": "0.8.9-nightly.2021.9.29+commit.a1b2c3d4"
            },
            {
                "path": "soljson-v0.4.11+commit.68ef5810.js",
                "version": "0.4.11",
                "build": "commit.68ef5810",
                "longVersion": "0.4.11+commit.68ef5810"
            }
        ]
    }"#;

    pub async fn mount_list(server: &MockServer, architecture: Architecture, body: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/{architecture}/list.json")))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    fn catalog(server: &MockServer) -> ReleaseCatalog {
        let base_url = Url::parse(&format!("{}/", server.uri())).unwrap();
        ReleaseCatalog::new(reqwest::Client::new(), base_url)
    }

    #[tokio::test]
    async fn builds_are_indexed_by_both_versions() {
        let server = MockServer::start().await;
        mount_list(&server, Architecture::LinuxAmd64, LINUX_LIST_JSON).await;

        let catalog = catalog(&server).get(Architecture::LinuxAmd64).await.unwrap();
        assert_eq!(2, catalog.len());

        let build = catalog.by_long_version("0.8.9+commit.e5eed63a").unwrap();
        assert_eq!(
            format!(
                "{}/linux-amd64/solc-linux-amd64-v0.8.9+commit.e5eed63a",
                server.uri()
            ),
            build.url.to_string()
        );
        assert_eq!(Some("e5eed63a"), build.commit.as_deref());
        assert_eq!(1, build.urls.len());

        let build = catalog.by_version("0.8.10").unwrap();
        assert_eq!(
            "https://github.com/ethereum/solc-bin/raw/gh-pages/linux-amd64/solc-linux-amd64-v0.8.10+commit.fc410830",
            build.url.as_str()
        );
        assert!(catalog.by_version("0.8.11").is_none());
    }

    #[tokio::test]
    async fn releases_are_preferred_for_short_versions() {
        let server = MockServer::start().await;
        mount_list(&server, Architecture::Wasm, WASM_LIST_JSON).await;

        let catalog = catalog(&server).get(Architecture::Wasm).await.unwrap();
        let build = catalog.by_version("0.8.9").unwrap();
        assert_eq!("0.8.9+commit.e5eed63a", build.long_version);
        assert!(catalog
            .by_long_version("0.8.9-nightly.2021.9.29+commit.a1b2c3d4")
            .is_some());
    }

    #[tokio::test]
    async fn manifest_is_fetched_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/linux-amd64/list.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LINUX_LIST_JSON))
            .expect(1)
            .mount(&server)
            .await;

        let catalog = catalog(&server);
        let (first, second) = futures::join!(
            catalog.get(Architecture::LinuxAmd64),
            catalog.get(Architecture::LinuxAmd64)
        );
        first.unwrap();
        second.unwrap();
        catalog.get(Architecture::LinuxAmd64).await.unwrap();
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/linux-amd64/list.json"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_list(&server, Architecture::LinuxAmd64, LINUX_LIST_JSON).await;

        let catalog = catalog(&server);
        let result = catalog.get(Architecture::LinuxAmd64).await;
        assert!(
            matches!(result, Err(FetchError::Http { .. })),
            "unexpected result: {result:?}"
        );

        let retried = catalog.get(Architecture::LinuxAmd64).await.unwrap();
        assert_eq!(2, retried.len());
    }

    #[tokio::test]
    async fn malformed_manifest_is_reported() {
        let server = MockServer::start().await;
        mount_list(&server, Architecture::Wasm, r#"{"builds": [{"path": 1}]}"#).await;

        let result = catalog(&server).get(Architecture::Wasm).await;
        match result {
            Err(FetchError::Manifest { source, .. }) => {
                assert_eq!("builds[0].path", source.path().to_string())
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn list_url_can_be_overridden() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/custom/list.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LINUX_LIST_JSON))
            .mount(&server)
            .await;
        let list_url = Url::parse(&format!("{}/custom/list.json", server.uri())).unwrap();

        let catalog = catalog(&server).with_list_url(Architecture::LinuxAmd64, list_url);
        let build = catalog
            .get(Architecture::LinuxAmd64)
            .await
            .unwrap()
            .by_version("0.8.9")
            .unwrap();
        assert_eq!(
            format!(
                "{}/custom/solc-linux-amd64-v0.8.9+commit.e5eed63a",
                server.uri()
            ),
            build.url.to_string()
        );
    }
}
