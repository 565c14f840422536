//! Data expressions, RGB mixes and element sets

use super::user::ObjectMeta;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Wire prefix on expression ids that refer to RGB mixes
pub const RGB_MIX_ID_PREFIX: &str = "rgbmix-";
/// Wire prefix on built-in expressions; these are never stored or shared
pub const BUILTIN_EXPR_PREFIX: &str = "expr-";

/// Reference from an expression to a module at a pinned semantic version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleReference {
    #[serde(rename = "moduleID")]
    pub module_id: String,
    pub version: String,
}

impl ModuleReference {
    /// Parse the version as `major.minor.patch`
    pub fn semantic_version(&self) -> Result<(u32, u32, u32)> {
        let parts: Vec<&str> = self.version.split('.').collect();
        if parts.len() != 3 {
            return Err(Error::BadRequest(format!(
                "Invalid module version: {}",
                self.version
            )));
        }
        let mut nums = [0u32; 3];
        for (i, part) in parts.iter().enumerate() {
            nums[i] = part
                .parse()
                .map_err(|_| Error::BadRequest(format!("Invalid module version: {}", self.version)))?;
        }
        Ok((nums[0], nums[1], nums[2]))
    }
}

/// Validate an expression's module reference list: ids unique, versions semantic
pub fn validate_module_references(refs: &[ModuleReference]) -> Result<()> {
    for (i, module_ref) in refs.iter().enumerate() {
        module_ref.semantic_version()?;
        if refs[..i].iter().any(|r| r.module_id == module_ref.module_id) {
            return Err(Error::BadRequest(format!(
                "Duplicate module reference: {}",
                module_ref.module_id
            )));
        }
    }
    Ok(())
}

/// Named source snippet in the embedded expression language.
/// Stored as a map of id to item, one file per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionItem {
    pub name: String,
    pub expression: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub module_references: Vec<ModuleReference>,
    #[serde(flatten)]
    pub meta: ObjectMeta,
}

/// One colour channel of an RGB mix
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RgbMixChannel {
    #[serde(rename = "expressionID")]
    pub expression_id: String,
    pub range_min: f64,
    pub range_max: f64,
}

/// Named triple of expression channels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RgbMixItem {
    pub name: String,
    pub red: RgbMixChannel,
    pub green: RgbMixChannel,
    pub blue: RgbMixChannel,
    #[serde(flatten)]
    pub meta: ObjectMeta,
}

/// One emission line selection within an element set
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementLine {
    pub atomic_number: i8,
    #[serde(rename = "K")]
    pub k: bool,
    #[serde(rename = "L")]
    pub l: bool,
    #[serde(rename = "M")]
    pub m: bool,
}

/// Named list of element lines. Stored as a map of id to item, one file per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementSetItem {
    pub name: String,
    pub lines: Vec<ElementLine>,
    #[serde(flatten)]
    pub meta: ObjectMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semver_parses() {
        let m = ModuleReference {
            module_id: "mod1".into(),
            version: "1.2.3".into(),
        };
        assert_eq!(m.semantic_version().unwrap(), (1, 2, 3));
    }

    #[test]
    fn semver_rejects_malformed() {
        for bad in ["1.2", "1.2.3.4", "a.b.c", ""] {
            let m = ModuleReference {
                module_id: "mod1".into(),
                version: bad.into(),
            };
            assert!(m.semantic_version().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn duplicate_module_ids_rejected() {
        let refs = vec![
            ModuleReference { module_id: "m1".into(), version: "1.0.0".into() },
            ModuleReference { module_id: "m1".into(), version: "2.0.0".into() },
        ];
        assert!(validate_module_references(&refs).is_err());

        let ok = vec![
            ModuleReference { module_id: "m1".into(), version: "1.0.0".into() },
            ModuleReference { module_id: "m2".into(), version: "2.0.0".into() },
        ];
        assert!(validate_module_references(&ok).is_ok());
    }
}
