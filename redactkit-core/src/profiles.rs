// File: redactkit-core/src/profiles.rs

//! profiles.rs - Compliance profiles: loading, signing and application.
//!
//! A profile is a named, reusable adjustment of the pattern catalogue and detection options
//! for one compliance regime (GDPR, HIPAA, CCPA, ...). It can switch patterns on or off,
//! override their severity or priority, add whitelist terms and tighten thresholds.
//!
//! Profiles may be signed with HMAC-SHA256. When `REDACTKIT_PROFILE_KEY` (hex) is set,
//! `load_profile_by_name` refuses any signed profile whose signature does not verify.
//!
//! license: MIT OR Apache-2.0

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use hmac::{Hmac, Mac};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_yml::Value;
use sha2::Sha256;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{DetectOptions, PatternCatalog, PatternRule, Severity};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_ALG: &str = "hmac-sha256";
pub const PROFILE_KEY_ENV: &str = "REDACTKIT_PROFILE_KEY";

/// The top-level structure representing a compliance profile.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "snake_case", default)]
pub struct ProfileConfig {
    pub profile_name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub version: String,
    pub compliance_scope: Option<String>,
    pub revision_date: Option<NaiveDate>,
    pub rules: Vec<ProfileRule>,
    /// Extra whitelist terms merged into the options.
    pub whitelist: Vec<String>,
    pub confidence_threshold: Option<f64>,
    pub enable_false_positive_filter: Option<bool>,
    pub signature: Option<String>,
    pub signature_alg: Option<String>,
}

/// A per-pattern override.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ProfileRule {
    pub pattern_type: String,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub priority: Option<i32>,
}

impl ProfileConfig {
    /// Checks that the profile is versioned, only overrides known pattern types and keeps its
    /// threshold within `[0, 1]`.
    pub fn validate(&self, catalog: &PatternCatalog) -> Result<()> {
        if self.version.trim().is_empty() {
            bail!("Profile '{}' validation failed: 'version' field cannot be empty.", self.profile_name);
        }

        let known: HashSet<&str> = catalog.patterns.iter().map(|r| r.pattern_type.as_str()).collect();
        for rule in &self.rules {
            if !known.contains(rule.pattern_type.as_str()) {
                bail!(
                    "Profile '{}' validation failed: pattern '{}' not found in the catalogue.",
                    self.profile_name,
                    rule.pattern_type
                );
            }
        }

        if let Some(threshold) = self.confidence_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                bail!(
                    "Profile '{}' validation failed: 'confidence_threshold' must be within [0, 1], got {}.",
                    self.profile_name,
                    threshold
                );
            }
        }

        if self.whitelist.iter().any(|t| t.trim().is_empty()) {
            warn!("Profile '{}': empty whitelist terms are ignored.", self.profile_name);
        }

        Ok(())
    }

    /// Verifies the HMAC-SHA256 signature of the profile.
    ///
    /// `raw_bytes` is the full content of the YAML file; the signature is recomputed over it
    /// with the `signature` and `signature_alg` keys removed. Unsigned profiles pass.
    pub fn verify_signature(&self, raw_bytes: &[u8], key: &[u8]) -> Result<bool> {
        let Some(stored_signature) = self.signature.as_ref() else {
            debug!("Profile '{}' is unsigned, skipping signature verification.", self.profile_name);
            return Ok(true);
        };

        if self.signature_alg.as_deref() != Some(SIGNATURE_ALG) {
            bail!(
                "Profile '{}' signature verification failed: Unsupported signature algorithm '{}'. Only '{}' is supported.",
                self.profile_name,
                self.signature_alg.as_deref().unwrap_or("none"),
                SIGNATURE_ALG
            );
        }

        debug!("Profile '{}': Verifying signature...", self.profile_name);
        let computed_signature = compute_signature(raw_bytes, key)?;

        if computed_signature.eq_ignore_ascii_case(stored_signature) {
            debug!("Profile '{}' signature verification succeeded.", self.profile_name);
            Ok(true)
        } else {
            warn!("Profile '{}' signature verification failed.", self.profile_name);
            Err(anyhow!(
                "Profile signature verification failed for profile '{}'. The profile may have been tampered with.",
                self.profile_name
            ))
        }
    }
}

/// Re-serialises the profile YAML with the signature keys removed.
fn get_raw_profile_for_signature(raw_bytes: &[u8]) -> Result<Vec<u8>> {
    let mut profile_value: Value = serde_yml::from_slice(raw_bytes)
        .context("Failed to parse profile YAML for signature verification.")?;

    if let Value::Mapping(mapping) = &mut profile_value {
        mapping.remove(&Value::String("signature".to_string()));
        mapping.remove(&Value::String("signature_alg".to_string()));
    }

    serde_yml::to_string(&profile_value)
        .context("Failed to re-serialize profile for signature verification.")
        .map(|s| s.into_bytes())
}

fn compute_signature(raw_bytes: &[u8], key: &[u8]) -> Result<String> {
    let raw_for_signing = get_raw_profile_for_signature(raw_bytes)?;
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| anyhow!("Failed to initialize HMAC-SHA256 with key: {}", e))?;
    mac.update(&raw_for_signing);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn candidate_dirs() -> Vec<PathBuf> {
    vec![
        dirs::home_dir().map(|p| p.join(".redactkit").join("profiles")),
        dirs::config_dir().map(|p| p.join("redactkit").join("profiles")),
        Some(PathBuf::from("/etc/redactkit/profiles")),
        Some(PathBuf::from("./config")),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Locations searched, in order, for a profile named `name`.
pub fn profile_candidate_paths(name: &str) -> Vec<PathBuf> {
    candidate_dirs()
        .into_iter()
        .map(|dir| dir.join(format!("{}.yaml", name)))
        .collect()
}

/// Parses a profile from raw YAML bytes, verifying its signature when a key is configured.
pub fn load_profile_from_bytes(raw_bytes: &[u8], origin: &str) -> Result<ProfileConfig> {
    let cfg: ProfileConfig =
        serde_yml::from_slice(raw_bytes).with_context(|| format!("parsing profile YAML {}", origin))?;

    if let Ok(key_hex) = std::env::var(PROFILE_KEY_ENV) {
        let key_bytes = hex::decode(key_hex.trim())
            .with_context(|| format!("Failed to decode {} from hex.", PROFILE_KEY_ENV))?;
        cfg.verify_signature(raw_bytes, &key_bytes)?;
    } else if cfg.signature.is_some() {
        warn!(
            "Profile '{}' is signed, but {} is not set. Signature verification skipped.",
            cfg.profile_name, PROFILE_KEY_ENV
        );
    }
    Ok(cfg)
}

/// Loads a profile from a file path, or by name from the standard profile locations.
pub fn load_profile_by_name(name_or_path: &str) -> Result<ProfileConfig> {
    debug!("Attempting to load profile from: '{}'", name_or_path);

    let path = Path::new(name_or_path);
    let path_to_load = if path.is_file() {
        path.to_path_buf()
    } else {
        profile_candidate_paths(name_or_path)
            .into_iter()
            .find(|p| p.is_file())
            .context("Profile not found. It is not a valid file path, and was not found in expected locations.")?
    };

    let raw_bytes =
        fs::read(&path_to_load).with_context(|| format!("reading profile file {}", path_to_load.display()))?;
    let cfg = load_profile_from_bytes(&raw_bytes, &path_to_load.display().to_string())?;

    debug!("Successfully loaded profile '{}'.", cfg.profile_name);
    Ok(cfg)
}

/// Signs a profile file with an HMAC-SHA256 key and rewrites it in place.
pub fn sign_profile(path: &Path, key: &[u8]) -> Result<()> {
    debug!("Signing profile file: {}", path.display());

    let raw_bytes = fs::read(path).with_context(|| format!("reading profile file {}", path.display()))?;
    let mut cfg: ProfileConfig = serde_yml::from_slice(&raw_bytes)
        .with_context(|| format!("parsing profile YAML for signing {}", path.display()))?;

    // Sign the canonical serialisation so verification of the rewritten file matches.
    cfg.signature = None;
    cfg.signature_alg = None;
    let canonical = serde_yml::to_string(&cfg).context("Failed to serialize profile for signing.")?;
    let signature = compute_signature(canonical.as_bytes(), key)?;

    cfg.signature = Some(signature);
    cfg.signature_alg = Some(SIGNATURE_ALG.to_string());
    let updated_yaml = serde_yml::to_string(&cfg).context("Failed to re-serialize signed profile.")?;
    fs::write(path, updated_yaml).with_context(|| format!("writing signed profile to file {}", path.display()))?;

    debug!("Successfully signed profile '{}'.", cfg.profile_name);
    Ok(())
}

/// Applies a profile to a catalogue and a set of options.
///
/// Overrides for unknown pattern types are ignored with a warning.
pub fn apply_profile(
    profile: &ProfileConfig,
    mut catalog: PatternCatalog,
    mut options: DetectOptions,
) -> (PatternCatalog, DetectOptions) {
    debug!("Applying profile '{}'.", profile.profile_name);

    let mut by_type: HashMap<&str, &ProfileRule> = HashMap::new();
    for rule in &profile.rules {
        by_type.insert(rule.pattern_type.as_str(), rule);
    }

    let mut applied = 0usize;
    for rule in catalog.patterns.iter_mut() {
        if let Some(over) = by_type.remove(rule.pattern_type.as_str()) {
            apply_rule_override(rule, over);
            applied += 1;
        }
    }
    for missing in by_type.keys() {
        warn!("Profile rule '{}' not found in the catalogue. It will be ignored.", missing);
    }

    options.whitelist.extend(
        profile
            .whitelist
            .iter()
            .filter(|t| !t.trim().is_empty())
            .cloned(),
    );
    if let Some(threshold) = profile.confidence_threshold {
        options.confidence_threshold = threshold;
    }
    if let Some(enabled) = profile.enable_false_positive_filter {
        options.enable_false_positive_filter = enabled;
    }

    debug!("Applied {} pattern overrides from profile '{}'.", applied, profile.profile_name);
    (catalog, options)
}

fn apply_rule_override(rule: &mut PatternRule, over: &ProfileRule) {
    if let Some(enabled) = over.enabled {
        debug!("Applying enabled={} override for pattern '{}'", enabled, rule.pattern_type);
        rule.enabled = Some(enabled);
    }
    if let Some(severity) = over.severity {
        debug!("Applying severity='{}' override for pattern '{}'", severity, rule.pattern_type);
        rule.severity = severity;
    }
    if let Some(priority) = over.priority {
        rule.priority = priority;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub profile_name: String,
    pub display_name: Option<String>,
    pub version: String,
    pub description: Option<String>,
    pub path: Option<PathBuf>,
}

/// Lists profiles found in the standard locations. Unreadable files are skipped.
pub fn list_available_profiles() -> Vec<ProfileSummary> {
    let mut out = Vec::new();
    let mut seen_paths: HashSet<PathBuf> = HashSet::new();

    for dir in candidate_dirs() {
        let Ok(entries) = fs::read_dir(&dir) else {
            debug!("Candidate profile directory not found: {}", dir.display());
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("yaml") || !seen_paths.insert(path.clone()) {
                continue;
            }
            match fs::read_to_string(&path) {
                Ok(s) => match serde_yml::from_str::<ProfileConfig>(&s) {
                    Ok(cfg) => out.push(ProfileSummary {
                        profile_name: cfg.profile_name,
                        display_name: cfg.display_name,
                        version: cfg.version,
                        description: cfg.description,
                        path: Some(path),
                    }),
                    Err(_) => warn!("Failed to parse YAML for profile at: {}", path.display()),
                },
                Err(e) => warn!("Failed to read profile file at '{}': {}", path.display(), e),
            }
        }
    }
    out
}
