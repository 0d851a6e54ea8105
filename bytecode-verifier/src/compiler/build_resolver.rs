use super::{
    architecture::Architecture,
    compilers::Error,
    fetcher::FetchError,
    name::CompilerNameDetail,
    release_catalog::{Build, Catalog, ReleaseCatalog},
};
use std::sync::Arc;
use tracing::{instrument, warn};

/// The build chosen to serve a single compile request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildInfo {
    pub architecture: Architecture,
    pub build: Arc<Build>,
    /// The requested compiler, which may differ from the build in case of a fallback.
    pub name_detail: CompilerNameDetail,
}

impl BuildInfo {
    pub fn is_fallback(&self) -> bool {
        self.build.long_version != self.name_detail.long_version
    }
}

pub struct BuildResolver {
    catalog: Arc<ReleaseCatalog>,
}

impl BuildResolver {
    pub fn new(catalog: Arc<ReleaseCatalog>) -> Self {
        Self { catalog }
    }

    /// Picks the best build for the requested compiler.
    ///
    /// Preference order: exact match on native, exact match on wasm,
    /// short version match on native, short version match on wasm.
    #[instrument(skip(self), fields(compiler = %name), level = "debug")]
    pub async fn get_compatible_build(
        &self,
        name: &CompilerNameDetail,
        wasm: Architecture,
        native: Option<Architecture>,
    ) -> Result<BuildInfo, Error> {
        let (wasm_catalog, native_catalog) = futures::join!(self.catalog.get(wasm), async {
            match native {
                Some(native) => Some(self.catalog.get(native).await),
                None => None,
            }
        });

        let mut fetch_error: Option<FetchError> = None;
        let mut loaded = Vec::with_capacity(2);
        for (architecture, catalog) in native
            .zip(native_catalog)
            .into_iter()
            .chain(std::iter::once((wasm, wasm_catalog)))
        {
            match catalog {
                Ok(catalog) => loaded.push((architecture, catalog)),
                Err(err) => {
                    warn!(%architecture, "cannot fetch release catalog: {err}");
                    fetch_error.get_or_insert(err);
                }
            }
        }

        let exact = loaded
            .iter()
            .find_map(|(architecture, catalog)| Some((*architecture, exact_match(catalog, name)?)));
        let candidate = exact.or_else(|| {
            loaded.iter().find_map(|(architecture, catalog)| {
                Some((*architecture, catalog.by_version(&name.version)?))
            })
        });

        match (candidate, fetch_error) {
            (Some((architecture, build)), _) => {
                let info = BuildInfo {
                    architecture,
                    build,
                    name_detail: name.clone(),
                };
                if info.is_fallback() {
                    warn!(
                        requested = %name,
                        resolved = %info.build.long_version,
                        %architecture,
                        "exact compiler build not found, falling back to the same short version"
                    );
                }
                Ok(info)
            }
            (None, Some(err)) => Err(err.into()),
            (None, None) => Err(Error::CompilerNotFound(name.long_version.clone())),
        }
    }
}

fn exact_match(catalog: &Catalog, name: &CompilerNameDetail) -> Option<Arc<Build>> {
    catalog.by_long_version(&name.long_version).or_else(|| {
        catalog.by_version(&name.version).filter(|build| {
            build.prerelease.is_none()
                && build
                    .commit
                    .as_deref()
                    .is_some_and(|commit| name.matches_commit(commit))
        })
    })
}
