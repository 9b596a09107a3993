use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};
use crate::header::normalize_label;
use crate::models::{CanonicalField, HeaderMapping};
use crate::normalize::{DateHint, NumberFormat};

const BUILTIN_PROFILES: &str = include_str!("../assets/bank_profiles.json");

pub const GENERIC_KEY: &str = "generic";

fn default_min_score() -> usize {
    2
}

fn default_true() -> bool {
    true
}

/// How one bank's export maps onto canonical fields, and how its numbers and dates are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankProfile {
    pub bank_key: String,
    #[serde(default)]
    pub bank_version: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    pub header_aliases: BTreeMap<CanonicalField, Vec<String>>,
    #[serde(default)]
    pub noise_patterns: Vec<String>,
    pub number_format: NumberFormat,
    pub date_hints: Vec<DateHint>,
    #[serde(default = "default_min_score")]
    pub min_score: usize,
    #[serde(default = "default_true")]
    pub spreadsheet_dates: bool,
}

#[derive(Debug, Deserialize)]
struct RegistryDocument {
    profiles: Vec<BankProfile>,
}

/// Ranks candidate column assignments: exact label matches first, then longer aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct MatchStrength {
    exact: bool,
    alias_len: usize,
}

fn alias_strength(label: &str, alias: &str) -> Option<MatchStrength> {
    if alias.is_empty() || label.is_empty() {
        return None;
    }
    if label == alias {
        return Some(MatchStrength {
            exact: true,
            alias_len: alias.len(),
        });
    }
    let padded = format!(" {label} ");
    padded.contains(&format!(" {alias} ")).then_some(MatchStrength {
        exact: false,
        alias_len: alias.len(),
    })
}

impl BankProfile {
    /// The fallback used when no registered profile matches: Spanish number format,
    /// day-first dates and multi-language aliases.
    pub fn generic() -> Self {
        let aliases: &[(CanonicalField, &[&str])] = &[
            (
                CanonicalField::Date,
                &[
                    "fecha", "fecha operacion", "f operacion", "fecha movimiento", "fecha contable",
                    "date", "booking date", "transaction date", "posting date", "datum", "data",
                ],
            ),
            (
                CanonicalField::ValueDate,
                &["fecha valor", "f valor", "value date", "valuta", "wertstellung"],
            ),
            (
                CanonicalField::Amount,
                &["importe", "importe eur", "importe euros", "amount", "monto", "euros", "cantidad", "betrag", "importo", "montant"],
            ),
            (
                CanonicalField::Description,
                &["concepto", "descripcion", "description", "detalle", "movimiento", "concept", "details", "memo", "verwendungszweck"],
            ),
            (
                CanonicalField::Counterparty,
                &["beneficiario", "ordenante", "contraparte", "counterparty", "payee", "remitente", "destinatario", "mas datos"],
            ),
            (CanonicalField::Balance, &["saldo", "balance", "disponible", "running balance"]),
        ];
        let header_aliases = aliases
            .iter()
            .map(|(field, list)| (*field, list.iter().map(|a| a.to_string()).collect()))
            .collect();
        let date_hints = ["dd/mm/yyyy", "dd-mm-yyyy", "yyyy-mm-dd", "dd.mm.yyyy", "dd/mm/yy"]
            .iter()
            .filter_map(|p| DateHint::parse(p).ok())
            .collect();
        Self {
            bank_key: GENERIC_KEY.to_string(),
            bank_version: None,
            display_name: Some("Generic bank export".to_string()),
            header_aliases,
            noise_patterns: [
                "saldo final", "saldo inicial", "saldo anterior", "subtotal", "total", "suma y sigue",
                "pagina", "page", "continua en", "closing balance", "opening balance",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            number_format: NumberFormat::spanish(),
            date_hints,
            min_score: 2,
            spreadsheet_dates: true,
        }
    }

    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.bank_key)
    }

    /// Check required content and normalize aliases/noise patterns to the label form used in matching.
    pub fn validated(mut self) -> Result<Self> {
        let invalid = |reason: &str| IngestError::InvalidProfile {
            key: self.bank_key.clone(),
            reason: reason.to_string(),
        };
        if self.bank_key.trim().is_empty() {
            return Err(invalid("bankKey is empty"));
        }
        for field in CanonicalField::REQUIRED {
            let has_alias = self
                .header_aliases
                .get(&field)
                .is_some_and(|list| list.iter().any(|a| !normalize_label(a).is_empty()));
            if !has_alias {
                return Err(invalid(&format!("no header aliases for '{}'", field.key())));
            }
        }
        if self.date_hints.is_empty() {
            return Err(invalid("dateHints is empty"));
        }
        if Some(self.number_format.decimal_separator) == self.number_format.thousand_separator {
            return Err(invalid("decimal and thousand separators must differ"));
        }
        if self.min_score < CanonicalField::REQUIRED.len() {
            self.min_score = CanonicalField::REQUIRED.len();
        }
        for list in self.header_aliases.values_mut() {
            *list = list
                .iter()
                .map(|a| normalize_label(a))
                .filter(|a| !a.is_empty())
                .collect();
        }
        self.noise_patterns = self
            .noise_patterns
            .iter()
            .map(|p| normalize_label(p))
            .filter(|p| !p.is_empty())
            .collect();
        Ok(self)
    }

    /// Assign header columns to canonical fields. Each column serves at most one field.
    pub fn resolve_mapping(&self, labels: &[String]) -> HeaderMapping {
        let normalized: Vec<String> = labels.iter().map(|l| normalize_label(l)).collect();
        let mut candidates: Vec<(MatchStrength, usize, CanonicalField)> = Vec::new();
        for (field, aliases) in &self.header_aliases {
            for (col, label) in normalized.iter().enumerate() {
                let best = aliases
                    .iter()
                    .filter_map(|alias| alias_strength(label, &normalize_label(alias)))
                    .max();
                if let Some(strength) = best {
                    candidates.push((strength, col, *field));
                }
            }
        }
        // strongest first; leftmost column and declaration order break ties
        candidates.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        let mut columns = BTreeMap::new();
        let mut used = HashSet::new();
        for (_, col, field) in candidates {
            if columns.contains_key(&field) || used.contains(&col) {
                continue;
            }
            columns.insert(field, col);
            used.insert(col);
        }
        HeaderMapping::new(columns)
    }
}

/// The profile chosen for a file and the column mapping it produced.
#[derive(Debug, Clone)]
pub struct ProfileMatch<'a> {
    pub profile: &'a BankProfile,
    pub mapping: HeaderMapping,
    pub generic: bool,
}

/// Read-only set of bank profiles plus the generic fallback. Shared freely across parses.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: Vec<BankProfile>,
    generic: BankProfile,
}

impl ProfileRegistry {
    pub fn new(profiles: Vec<BankProfile>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut validated = Vec::with_capacity(profiles.len());
        for profile in profiles {
            if !seen.insert(profile.bank_key.clone()) {
                return Err(IngestError::InvalidProfile {
                    key: profile.bank_key,
                    reason: "duplicate bankKey".to_string(),
                });
            }
            validated.push(profile.validated()?);
        }
        Ok(Self {
            profiles: validated,
            generic: BankProfile::generic().validated()?,
        })
    }

    /// Only the generic fallback.
    pub fn generic_only() -> Result<Self> {
        Self::new(Vec::new())
    }

    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_PROFILES)
    }

    /// Load `{ "profiles": [ ... ] }`.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: RegistryDocument = serde_json::from_str(json)?;
        Self::new(doc.profiles)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn profiles(&self) -> &[BankProfile] {
        &self.profiles
    }

    pub fn generic(&self) -> &BankProfile {
        &self.generic
    }

    pub fn get(&self, bank_key: &str) -> Option<&BankProfile> {
        if bank_key == GENERIC_KEY {
            return Some(&self.generic);
        }
        self.profiles.iter().find(|p| p.bank_key == bank_key)
    }

    /// Pick the registered profile resolving the most canonical fields; earlier profiles win ties.
    /// Falls back to the generic profile, which must at least resolve date and amount.
    pub fn detect(&self, labels: &[String]) -> Result<ProfileMatch<'_>> {
        let mut best: Option<(&BankProfile, HeaderMapping)> = None;
        for profile in &self.profiles {
            let mapping = profile.resolve_mapping(labels);
            if !mapping.has_required() || mapping.len() < profile.min_score {
                continue;
            }
            let better = match &best {
                Some((_, current)) => mapping.len() > current.len(),
                None => true,
            };
            if better {
                best = Some((profile, mapping));
            }
        }
        if let Some((profile, mapping)) = best {
            debug!("matched bank profile {} ({} fields)", profile.bank_key, mapping.len());
            return Ok(ProfileMatch {
                profile,
                mapping,
                generic: false,
            });
        }

        let mapping = self.generic.resolve_mapping(labels);
        let missing = mapping.missing_required();
        if !missing.is_empty() {
            return Err(IngestError::MissingRequiredColumns { missing });
        }
        debug!("no bank profile matched, using generic ({} fields)", mapping.len());
        Ok(ProfileMatch {
            profile: &self.generic,
            mapping,
            generic: true,
        })
    }
}
