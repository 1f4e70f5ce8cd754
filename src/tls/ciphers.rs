//! Static cipher-suite classification and the suite lists offered by each
//! scan policy.

use serde::{Deserialize, Serialize};
use std::fmt;

pub type CipherSuiteId = u16;

pub const TLS_RSA_WITH_RC4_128_MD5: u16 = 0x0004;
pub const TLS_RSA_WITH_RC4_128_SHA: u16 = 0x0005;
pub const TLS_RSA_WITH_3DES_EDE_CBC_SHA: u16 = 0x000a;
pub const TLS_RSA_WITH_AES_128_CBC_SHA: u16 = 0x002f;
pub const TLS_RSA_WITH_AES_256_CBC_SHA: u16 = 0x0035;
pub const TLS_RSA_WITH_AES_128_CBC_SHA256: u16 = 0x003c;
pub const TLS_RSA_WITH_AES_256_CBC_SHA256: u16 = 0x003d;
pub const TLS_RSA_WITH_AES_128_GCM_SHA256: u16 = 0x009c;
pub const TLS_RSA_WITH_AES_256_GCM_SHA384: u16 = 0x009d;

pub const TLS_DHE_RSA_WITH_3DES_EDE_CBC_SHA: u16 = 0x0016;
pub const TLS_DHE_RSA_WITH_AES_128_CBC_SHA: u16 = 0x0033;
pub const TLS_DHE_RSA_WITH_AES_256_CBC_SHA: u16 = 0x0039;
pub const TLS_DHE_RSA_WITH_AES_128_CBC_SHA256: u16 = 0x0067;
pub const TLS_DHE_RSA_WITH_AES_256_CBC_SHA256: u16 = 0x006b;
pub const TLS_DHE_RSA_WITH_AES_128_GCM_SHA256: u16 = 0x009e;
pub const TLS_DHE_DSS_WITH_AES_128_CBC_SHA: u16 = 0x0032;
pub const TLS_DHE_DSS_WITH_AES_256_CBC_SHA: u16 = 0x0038;

pub const TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA: u16 = 0xc009;
pub const TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA: u16 = 0xc00a;
pub const TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA: u16 = 0xc012;
pub const TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA: u16 = 0xc013;
pub const TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA: u16 = 0xc014;
pub const TLS_ECDHE_ECDSA_WITH_3DES_EDE_CBC_SHA: u16 = 0xc008;
pub const TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256: u16 = 0xc023;
pub const TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA384: u16 = 0xc024;
pub const TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256: u16 = 0xc027;
pub const TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384: u16 = 0xc028;
pub const TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256: u16 = 0xc02b;
pub const TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384: u16 = 0xc02c;
pub const TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256: u16 = 0xc02f;
pub const TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384: u16 = 0xc030;
pub const TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_OLD: u16 = 0xcc13;
pub const TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_OLD: u16 = 0xcc14;

/// Suites whose ServerKeyExchange carries an ephemeral (export) RSA key.
/// Sorted for binary search.
pub static RSA_EXPORT_SUITES: &[CipherSuiteId] = &[
    0x0003, // TLS_RSA_EXPORT_WITH_RC4_40_MD5
    0x0006, // TLS_RSA_EXPORT_WITH_RC2_CBC_40_MD5
    0x0008, // TLS_RSA_EXPORT_WITH_DES40_CBC_SHA
    0x0060, // TLS_RSA_EXPORT1024_WITH_RC4_56_MD5
    0x0061, // TLS_RSA_EXPORT1024_WITH_RC2_CBC_56_MD5
    0x0062, // TLS_RSA_EXPORT1024_WITH_DES_CBC_SHA
    0x0064, // TLS_RSA_EXPORT1024_WITH_RC4_56_SHA
];

/// Export-grade finite-field DH suites. Sorted.
pub static DHE_EXPORT_SUITES: &[CipherSuiteId] = &[
    0x000b, // TLS_DH_DSS_EXPORT_WITH_DES40_CBC_SHA
    0x000e, // TLS_DH_RSA_EXPORT_WITH_DES40_CBC_SHA
    0x0011, // TLS_DHE_DSS_EXPORT_WITH_DES40_CBC_SHA
    0x0014, // TLS_DHE_RSA_EXPORT_WITH_DES40_CBC_SHA
    0x0017, // TLS_DH_anon_EXPORT_WITH_RC4_40_MD5
    0x0019, // TLS_DH_anon_EXPORT_WITH_DES40_CBC_SHA
    0x0063, // TLS_DHE_DSS_EXPORT1024_WITH_DES_CBC_SHA
    0x0065, // TLS_DHE_DSS_EXPORT1024_WITH_RC4_56_SHA
];

/// Non-export ephemeral finite-field DH suites (DHE and DH_anon). Sorted.
pub static DHE_SUITES: &[CipherSuiteId] = &[
    0x0012, 0x0013, 0x0015, 0x0016, 0x0018, 0x001a, 0x001b, 0x0032, 0x0033, 0x0034, 0x0038,
    0x0039, 0x003a, 0x0040, 0x0044, 0x0045, 0x0046, 0x0066, 0x0067, 0x006a, 0x006b, 0x006c,
    0x006d, 0x0087, 0x0088, 0x0089, 0x0099, 0x009a, 0x009b, 0x009e, 0x009f, 0x00a2, 0x00a3,
    0x00a6, 0x00a7, 0xc09e, 0xc09f, 0xc0a2, 0xc0a3, 0xccaa,
];

/// Key-exchange family a negotiated suite belongs to. Every 16-bit id maps to
/// exactly one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CipherFamily {
    None,
    RsaExport,
    DheExport,
    Dhe,
}

pub fn family_of(suite: CipherSuiteId) -> CipherFamily {
    if RSA_EXPORT_SUITES.binary_search(&suite).is_ok() {
        CipherFamily::RsaExport
    } else if DHE_EXPORT_SUITES.binary_search(&suite).is_ok() {
        CipherFamily::DheExport
    } else if DHE_SUITES.binary_search(&suite).is_ok() {
        CipherFamily::Dhe
    } else {
        CipherFamily::None
    }
}

/// ECDHE/ECDH suites need the elliptic-curve hello extensions.
pub fn is_elliptic(suite: CipherSuiteId) -> bool {
    (0xc001..=0xc03b).contains(&suite)
        || (0xc048..=0xc04f).contains(&suite)
        || matches!(suite, 0xcc13 | 0xcc14 | 0xcca8 | 0xcca9)
}

static RSA_512_EXPORT_SUITES: &[CipherSuiteId] = &[0x0003, 0x0006, 0x0008];

static DHE_ONLY_SUITES: &[CipherSuiteId] = &[
    TLS_DHE_RSA_WITH_AES_128_GCM_SHA256,
    0x009f,
    TLS_DHE_RSA_WITH_AES_256_CBC_SHA256,
    TLS_DHE_RSA_WITH_AES_128_CBC_SHA256,
    TLS_DHE_RSA_WITH_AES_256_CBC_SHA,
    TLS_DHE_RSA_WITH_AES_128_CBC_SHA,
    TLS_DHE_DSS_WITH_AES_256_CBC_SHA,
    TLS_DHE_DSS_WITH_AES_128_CBC_SHA,
    TLS_DHE_RSA_WITH_3DES_EDE_CBC_SHA,
    0x0013,
    0x0015,
    0x0012,
];

static DHE_EXPORT_ONLY_SUITES: &[CipherSuiteId] = &[0x0014, 0x0011, 0x0063, 0x0065];

static DEFAULT_SUITES: &[CipherSuiteId] = &[
    TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
    TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
    TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
    TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
    TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256,
    TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256,
    TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA,
    TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA,
    TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA,
    TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA,
    TLS_DHE_RSA_WITH_AES_128_GCM_SHA256,
    TLS_DHE_RSA_WITH_AES_128_CBC_SHA,
    TLS_DHE_RSA_WITH_AES_256_CBC_SHA,
    TLS_DHE_DSS_WITH_AES_128_CBC_SHA,
    TLS_RSA_WITH_AES_128_GCM_SHA256,
    TLS_RSA_WITH_AES_256_GCM_SHA384,
    TLS_RSA_WITH_AES_128_CBC_SHA256,
    TLS_RSA_WITH_AES_256_CBC_SHA256,
    TLS_RSA_WITH_AES_128_CBC_SHA,
    TLS_RSA_WITH_AES_256_CBC_SHA,
    TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA,
    TLS_RSA_WITH_3DES_EDE_CBC_SHA,
    TLS_RSA_WITH_RC4_128_SHA,
    TLS_RSA_WITH_RC4_128_MD5,
];

static CHROME_SUITES: &[CipherSuiteId] = &[
    TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
    TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
    TLS_DHE_RSA_WITH_AES_128_GCM_SHA256,
    TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_OLD,
    TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_OLD,
    TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA,
    TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA,
    TLS_DHE_RSA_WITH_AES_256_CBC_SHA,
    TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA,
    TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA,
    TLS_DHE_RSA_WITH_AES_128_CBC_SHA,
    TLS_RSA_WITH_AES_128_GCM_SHA256,
    TLS_RSA_WITH_AES_256_CBC_SHA,
    TLS_RSA_WITH_AES_128_CBC_SHA,
    TLS_RSA_WITH_3DES_EDE_CBC_SHA,
];

static CHROME_NO_DHE_SUITES: &[CipherSuiteId] = &[
    TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
    TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
    TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_OLD,
    TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_OLD,
    TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA,
    TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA,
    TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA,
    TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA,
    TLS_RSA_WITH_AES_128_GCM_SHA256,
    TLS_RSA_WITH_AES_256_CBC_SHA,
    TLS_RSA_WITH_AES_128_CBC_SHA,
    TLS_RSA_WITH_3DES_EDE_CBC_SHA,
];

static FIREFOX_SUITES: &[CipherSuiteId] = &[
    TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
    TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
    TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA,
    TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA,
    TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA,
    TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA,
    TLS_DHE_RSA_WITH_AES_128_CBC_SHA,
    TLS_DHE_RSA_WITH_AES_256_CBC_SHA,
    TLS_RSA_WITH_AES_128_CBC_SHA,
    TLS_RSA_WITH_AES_256_CBC_SHA,
    TLS_RSA_WITH_3DES_EDE_CBC_SHA,
];

static FIREFOX_NO_DHE_SUITES: &[CipherSuiteId] = &[
    TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
    TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
    TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA,
    TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA,
    TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA,
    TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA,
    TLS_RSA_WITH_AES_128_CBC_SHA,
    TLS_RSA_WITH_AES_256_CBC_SHA,
    TLS_RSA_WITH_3DES_EDE_CBC_SHA,
];

static SAFARI_SUITES: &[CipherSuiteId] = &[
    TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
    TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
    TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA384,
    TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256,
    TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA,
    TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA,
    TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
    TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
    TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384,
    TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256,
    TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA,
    TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA,
    TLS_DHE_RSA_WITH_AES_256_CBC_SHA256,
    TLS_DHE_RSA_WITH_AES_128_CBC_SHA256,
    TLS_DHE_RSA_WITH_AES_256_CBC_SHA,
    TLS_DHE_RSA_WITH_AES_128_CBC_SHA,
    TLS_RSA_WITH_AES_256_GCM_SHA384,
    TLS_RSA_WITH_AES_128_GCM_SHA256,
    TLS_RSA_WITH_AES_256_CBC_SHA256,
    TLS_RSA_WITH_AES_128_CBC_SHA256,
    TLS_RSA_WITH_AES_256_CBC_SHA,
    TLS_RSA_WITH_AES_128_CBC_SHA,
    TLS_ECDHE_ECDSA_WITH_3DES_EDE_CBC_SHA,
    TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA,
    TLS_DHE_RSA_WITH_3DES_EDE_CBC_SHA,
    TLS_RSA_WITH_3DES_EDE_CBC_SHA,
];

static SAFARI_NO_DHE_SUITES: &[CipherSuiteId] = &[
    TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
    TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
    TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA384,
    TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256,
    TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA,
    TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA,
    TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
    TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
    TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384,
    TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256,
    TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA,
    TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA,
    TLS_RSA_WITH_AES_256_GCM_SHA384,
    TLS_RSA_WITH_AES_128_GCM_SHA256,
    TLS_RSA_WITH_AES_256_CBC_SHA256,
    TLS_RSA_WITH_AES_128_CBC_SHA256,
    TLS_RSA_WITH_AES_256_CBC_SHA,
    TLS_RSA_WITH_AES_128_CBC_SHA,
    TLS_ECDHE_ECDSA_WITH_3DES_EDE_CBC_SHA,
    TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA,
    TLS_RSA_WITH_3DES_EDE_CBC_SHA,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Browser {
    Chrome,
    ChromeNoDhe,
    Firefox,
    FirefoxNoDhe,
    Safari,
    SafariNoDhe,
}

impl Browser {
    pub const ALL: [Browser; 6] = [
        Browser::Chrome,
        Browser::ChromeNoDhe,
        Browser::Firefox,
        Browser::FirefoxNoDhe,
        Browser::Safari,
        Browser::SafariNoDhe,
    ];

    fn suites(self) -> &'static [CipherSuiteId] {
        match self {
            Browser::Chrome => CHROME_SUITES,
            Browser::ChromeNoDhe => CHROME_NO_DHE_SUITES,
            Browser::Firefox => FIREFOX_SUITES,
            Browser::FirefoxNoDhe => FIREFOX_NO_DHE_SUITES,
            Browser::Safari => SAFARI_SUITES,
            Browser::SafariNoDhe => SAFARI_NO_DHE_SUITES,
        }
    }
}

/// Which suites a handshake offers. Exactly one policy applies per handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CipherPolicy {
    #[default]
    Default,
    DheOnly,
    ExportOnly,
    ExportDheOnly,
    Browser(Browser),
}

impl CipherPolicy {
    pub fn suites(self) -> &'static [CipherSuiteId] {
        match self {
            CipherPolicy::Default => DEFAULT_SUITES,
            CipherPolicy::DheOnly => DHE_ONLY_SUITES,
            CipherPolicy::ExportOnly => RSA_512_EXPORT_SUITES,
            CipherPolicy::ExportDheOnly => DHE_EXPORT_ONLY_SUITES,
            CipherPolicy::Browser(browser) => browser.suites(),
        }
    }

    /// Browser emulation must not fall back to a suite outside its list, so a
    /// server that accepts none of them is itself the measurement.
    pub fn force_suites(self) -> bool {
        matches!(self, CipherPolicy::Browser(_))
    }
}

impl fmt::Display for CipherPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CipherPolicy::Default => "default",
            CipherPolicy::DheOnly => "dhe-only",
            CipherPolicy::ExportOnly => "export-only",
            CipherPolicy::ExportDheOnly => "export-dhe-only",
            CipherPolicy::Browser(Browser::Chrome) => "chrome",
            CipherPolicy::Browser(Browser::ChromeNoDhe) => "chrome-no-dhe",
            CipherPolicy::Browser(Browser::Firefox) => "firefox",
            CipherPolicy::Browser(Browser::FirefoxNoDhe) => "firefox-no-dhe",
            CipherPolicy::Browser(Browser::Safari) => "safari",
            CipherPolicy::Browser(Browser::SafariNoDhe) => "safari-no-dhe",
        };
        write!(f, "{}", label)
    }
}

/// The independent switches a scan configuration may carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyFlags {
    pub dhe_only: bool,
    pub export_only: bool,
    pub export_dhe_only: bool,
    pub chrome: bool,
    pub chrome_no_dhe: bool,
    pub firefox: bool,
    pub firefox_no_dhe: bool,
    pub safari: bool,
    pub safari_no_dhe: bool,
}

impl PolicyFlags {
    fn ordered(&self) -> [(bool, CipherPolicy); 9] {
        [
            (self.dhe_only, CipherPolicy::DheOnly),
            (self.export_only, CipherPolicy::ExportOnly),
            (self.export_dhe_only, CipherPolicy::ExportDheOnly),
            (self.chrome, CipherPolicy::Browser(Browser::Chrome)),
            (self.chrome_no_dhe, CipherPolicy::Browser(Browser::ChromeNoDhe)),
            (self.firefox, CipherPolicy::Browser(Browser::Firefox)),
            (self.firefox_no_dhe, CipherPolicy::Browser(Browser::FirefoxNoDhe)),
            (self.safari, CipherPolicy::Browser(Browser::Safari)),
            (self.safari_no_dhe, CipherPolicy::Browser(Browser::SafariNoDhe)),
        ]
    }

    pub fn selected(&self) -> usize {
        self.ordered().iter().filter(|(set, _)| *set).count()
    }

    /// First set flag wins, in the order DHE-only, export-only,
    /// export-DHE-only, then the browser sets as listed.
    pub fn resolve(&self) -> CipherPolicy {
        self.ordered()
            .into_iter()
            .find(|(set, _)| *set)
            .map(|(_, policy)| policy)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_tables_are_sorted_for_lookup() {
        for table in [RSA_EXPORT_SUITES, DHE_EXPORT_SUITES, DHE_SUITES] {
            assert!(table.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn families_partition_the_suite_space() {
        let mut counts = [0usize; 4];
        for id in 0..=u16::MAX {
            let memberships = [
                RSA_EXPORT_SUITES.contains(&id),
                DHE_EXPORT_SUITES.contains(&id),
                DHE_SUITES.contains(&id),
            ];
            assert!(memberships.iter().filter(|m| **m).count() <= 1, "{id:#06x}");
            let idx = match family_of(id) {
                CipherFamily::None => 0,
                CipherFamily::RsaExport => 1,
                CipherFamily::DheExport => 2,
                CipherFamily::Dhe => 3,
            };
            counts[idx] += 1;
        }
        assert_eq!(counts.iter().sum::<usize>(), 65536);
        assert_eq!(counts[1], RSA_EXPORT_SUITES.len());
        assert_eq!(counts[2], DHE_EXPORT_SUITES.len());
        assert_eq!(counts[3], DHE_SUITES.len());
    }

    #[test]
    fn classifies_well_known_suites() {
        assert_eq!(family_of(0x0003), CipherFamily::RsaExport);
        assert_eq!(family_of(0x0014), CipherFamily::DheExport);
        assert_eq!(family_of(TLS_DHE_RSA_WITH_AES_128_CBC_SHA), CipherFamily::Dhe);
        assert_eq!(family_of(TLS_RSA_WITH_AES_128_CBC_SHA), CipherFamily::None);
        assert_eq!(family_of(TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256), CipherFamily::None);
    }

    #[test]
    fn policy_lists_match_their_family() {
        assert!(CipherPolicy::ExportOnly
            .suites()
            .iter()
            .all(|s| family_of(*s) == CipherFamily::RsaExport));
        assert!(CipherPolicy::ExportDheOnly
            .suites()
            .iter()
            .all(|s| family_of(*s) == CipherFamily::DheExport));
        assert!(CipherPolicy::DheOnly
            .suites()
            .iter()
            .all(|s| family_of(*s) == CipherFamily::Dhe));
        for browser in [Browser::ChromeNoDhe, Browser::FirefoxNoDhe, Browser::SafariNoDhe] {
            assert!(CipherPolicy::Browser(browser)
                .suites()
                .iter()
                .all(|s| family_of(*s) == CipherFamily::None));
        }
    }

    #[test]
    fn only_browser_policies_force_suites() {
        assert!(!CipherPolicy::Default.force_suites());
        assert!(!CipherPolicy::DheOnly.force_suites());
        for browser in Browser::ALL {
            assert!(CipherPolicy::Browser(browser).force_suites());
        }
    }

    #[test]
    fn first_set_flag_wins() {
        let flags = PolicyFlags {
            export_dhe_only: true,
            safari: true,
            dhe_only: true,
            ..Default::default()
        };
        assert_eq!(flags.selected(), 3);
        assert_eq!(flags.resolve(), CipherPolicy::DheOnly);

        let flags = PolicyFlags {
            firefox_no_dhe: true,
            safari_no_dhe: true,
            ..Default::default()
        };
        assert_eq!(
            flags.resolve(),
            CipherPolicy::Browser(Browser::FirefoxNoDhe)
        );
        assert_eq!(PolicyFlags::default().resolve(), CipherPolicy::Default);
    }
}
