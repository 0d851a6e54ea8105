use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use url::Url;

/// Build flavours published by the solc binaries host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Architecture {
    Wasm,
    LinuxAmd64,
    MacosAmd64,
    WindowsAmd64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArchitectureConfig {
    pub is_wasm: bool,
    /// Value of `std::env::consts::OS` able to run the builds.
    pub platform: Option<&'static str>,
    /// Directory of the builds relative to the binaries host.
    pub directory: &'static str,
}

const WASM: ArchitectureConfig = ArchitectureConfig {
    is_wasm: true,
    platform: None,
    directory: "wasm",
};
const LINUX_AMD64: ArchitectureConfig = ArchitectureConfig {
    is_wasm: false,
    platform: Some("linux"),
    directory: "linux-amd64",
};
const MACOS_AMD64: ArchitectureConfig = ArchitectureConfig {
    is_wasm: false,
    platform: Some("macos"),
    directory: "macosx-amd64",
};
const WINDOWS_AMD64: ArchitectureConfig = ArchitectureConfig {
    is_wasm: false,
    platform: Some("windows"),
    directory: "windows-amd64",
};

impl Architecture {
    pub const ALL: [Architecture; 4] = [
        Architecture::Wasm,
        Architecture::LinuxAmd64,
        Architecture::MacosAmd64,
        Architecture::WindowsAmd64,
    ];

    pub fn config(&self) -> &'static ArchitectureConfig {
        match self {
            Architecture::Wasm => &WASM,
            Architecture::LinuxAmd64 => &LINUX_AMD64,
            Architecture::MacosAmd64 => &MACOS_AMD64,
            Architecture::WindowsAmd64 => &WINDOWS_AMD64,
        }
    }

    pub fn is_wasm(&self) -> bool {
        self.config().is_wasm
    }

    /// Native architecture able to run on the current host, if any.
    pub fn native_for_host() -> Option<Self> {
        Self::native_for(std::env::consts::OS, std::env::consts::ARCH)
    }

    fn native_for(os: &str, arch: &str) -> Option<Self> {
        match (os, arch) {
            ("linux", "x86_64") => Some(Architecture::LinuxAmd64),
            // arm machines run amd64 builds through Rosetta
            ("macos", "x86_64" | "aarch64") => Some(Architecture::MacosAmd64),
            ("windows", "x86_64") => Some(Architecture::WindowsAmd64),
            _ => None,
        }
    }

    pub fn list_url(&self, base: &Url) -> Result<Url, url::ParseError> {
        base.join(&format!("{}/list.json", self.config().directory))
    }

    /// Local file name of the build with the given long version.
    pub fn artifact_filename(&self, long_version: &str) -> String {
        let extension = match self {
            Architecture::Wasm => ".js",
            Architecture::WindowsAmd64 => ".exe",
            Architecture::LinuxAmd64 | Architecture::MacosAmd64 => "",
        };
        format!(
            "solc-{}-v{}{}",
            self.config().directory,
            long_version,
            extension
        )
    }
}

impl Display for Architecture {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.config().directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const BASE: &str = "https://binaries.soliditylang.org/";

    fn base() -> Url {
        Url::parse(BASE).unwrap()
    }

    #[rstest]
    #[case(Architecture::Wasm, "https://binaries.soliditylang.org/wasm/list.json")]
    #[case(Architecture::LinuxAmd64, "https://binaries.soliditylang.org/linux-amd64/list.json")]
    #[case(Architecture::MacosAmd64, "https://binaries.soliditylang.org/macosx-amd64/list.json")]
    #[case(Architecture::WindowsAmd64, "https://binaries.soliditylang.org/windows-amd64/list.json")]
    fn list_urls(#[case] arch: Architecture, #[case] expected: &str) {
        assert_eq!(expected, arch.list_url(&base()).unwrap().as_str());
    }

    #[test]
    fn artifact_filenames() {
        let name = "0.8.9+commit.e5eed63a";
        assert_eq!(
            "solc-wasm-v0.8.9+commit.e5eed63a.js",
            Architecture::Wasm.artifact_filename(name)
        );
        assert_eq!(
            "solc-linux-amd64-v0.8.9+commit.e5eed63a",
            Architecture::LinuxAmd64.artifact_filename(name)
        );
        assert_eq!(
            "solc-windows-amd64-v0.8.9+commit.e5eed63a.exe",
            Architecture::WindowsAmd64.artifact_filename(name)
        );
    }

    #[test]
    fn only_wasm_is_wasm() {
        let wasm: Vec<_> = Architecture::ALL
            .into_iter()
            .filter(Architecture::is_wasm)
            .collect();
        assert_eq!(vec![Architecture::Wasm], wasm);
    }

    #[rstest]
    #[case("linux", "x86_64", Some(Architecture::LinuxAmd64))]
    #[case("linux", "aarch64", None)]
    #[case("macos", "aarch64", Some(Architecture::MacosAmd64))]
    #[case("windows", "x86_64", Some(Architecture::WindowsAmd64))]
    #[case("freebsd", "x86_64", None)]
    fn native_architectures(
        #[case] os: &str,
        #[case] arch: &str,
        #[case] expected: Option<Architecture>,
    ) {
        assert_eq!(expected, Architecture::native_for(os, arch));
    }
}
