//! Typed records returned by the scale endpoints.
//!
//! The cloud is loose about types (numbers arrive as strings and vice versa)
//! and about field names (`wegith`, `nick_name`). Every field is therefore
//! optional and decoded leniently, so one odd value never costs a whole page.
//! Scale records keep the received object so writing them back to disk
//! changes nothing the cloud sent.

use crate::profile::UserProfile;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Query options for one page of measurement history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub page_size: u32,
    /// 1-based page number
    pub page_no: u32,
    /// Only records created at or after this instant (ms since epoch)
    pub start_time: Option<i64>,
    /// Keep only records of this user (applied client-side)
    pub user_id: Option<String>,
}

impl Default for RecordQuery {
    fn default() -> Self {
        Self {
            page_size: 10,
            page_no: 1,
            start_time: None,
            user_id: None,
        }
    }
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn page_no(mut self, page_no: u32) -> Self {
        self.page_no = page_no;
        self
    }

    pub fn start_time(mut self, start_time: i64) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn user<U: Into<String>>(mut self, user_id: U) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// `result` payload of the history endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryPage {
    pub records: Vec<ScaleRecord>,
    #[serde(default, deserialize_with = "de::opt_u64")]
    pub total: Option<u64>,
    #[serde(default)]
    pub has_more: Option<bool>,
}

/// One weighing.
///
/// The object received from the cloud is kept as-is in `raw`; the typed fields
/// are decoded from it. Serializing writes `raw` back, replacing only the
/// known fields whose typed value no longer matches what `raw` decodes to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct ScaleRecord {
    pub id: String,
    pub device_id: Option<String>,
    pub user_id: Option<String>,
    /// `nick_name` on the wire, `nickname` also accepted.
    pub nickname: Option<String>,
    /// Kilograms. The API spells the key `wegith`.
    pub weight: Option<f64>,
    /// Centimetres.
    pub height: Option<f64>,
    /// Bioelectrical impedance (`body_r`); `"0"` when the scale could not measure it.
    pub resistance: Option<String>,
    /// Milliseconds since epoch.
    pub create_time: i64,
    pub analysis_report: Option<AnalysisReport>,
    /// The record object as received, including keys not modelled here.
    pub raw: Map<String, Value>,
}

const ID: &[&str] = &["id"];
const DEVICE_ID: &[&str] = &["device_id"];
const USER_ID: &[&str] = &["user_id"];
const NICKNAME: &[&str] = &["nick_name", "nickname"];
const WEIGHT: &[&str] = &["wegith", "weight"];
const HEIGHT: &[&str] = &["height"];
const RESISTANCE: &[&str] = &["body_r"];
const CREATE_TIME: &[&str] = &["create_time"];
const ANALYSIS_REPORT: &[&str] = &["analysis_report"];

/// First present key among `keys` (or the first key) and its value.
fn lookup<'a>(raw: &'a Map<String, Value>, keys: &[&'static str]) -> (&'static str, Option<&'a Value>) {
    keys.iter()
        .find_map(|k| raw.get(*k).map(|v| (*k, Some(v))))
        .unwrap_or((keys[0], None))
}

fn decode_report(value: Option<&Value>) -> Option<AnalysisReport> {
    value
        .filter(|v| v.is_object())
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// Store `typed` under its key unless `raw` already decodes to the same value.
fn write_back<T: PartialEq>(
    raw: &mut Map<String, Value>,
    keys: &[&'static str],
    decode: fn(Option<&Value>) -> T,
    typed: T,
    encode: impl FnOnce(T) -> Option<Value>,
) {
    let (key, current) = lookup(raw, keys);
    if decode(current) == typed {
        return;
    }
    match encode(typed) {
        Some(value) => {
            raw.insert(key.to_string(), value);
        }
        None => {
            raw.remove(key);
        }
    }
}

fn number(value: f64) -> Option<Value> {
    serde_json::Number::from_f64(value).map(Value::Number)
}

impl From<Map<String, Value>> for ScaleRecord {
    fn from(raw: Map<String, Value>) -> Self {
        let text = |keys: &[&'static str]| de::string_value(lookup(&raw, keys).1);
        Self {
            id: text(ID).unwrap_or_default(),
            device_id: text(DEVICE_ID),
            user_id: text(USER_ID),
            nickname: text(NICKNAME),
            weight: de::f64_value(lookup(&raw, WEIGHT).1),
            height: de::f64_value(lookup(&raw, HEIGHT).1),
            resistance: text(RESISTANCE),
            create_time: de::i64_value(lookup(&raw, CREATE_TIME).1),
            analysis_report: decode_report(lookup(&raw, ANALYSIS_REPORT).1),
            raw,
        }
    }
}

impl From<ScaleRecord> for Map<String, Value> {
    fn from(record: ScaleRecord) -> Self {
        let mut raw = record.raw;
        let text = |s: Option<String>| s.map(Value::String);
        write_back(&mut raw, ID, |v| de::string_value(v).unwrap_or_default(), record.id, |s| {
            Some(Value::String(s))
        });
        write_back(&mut raw, DEVICE_ID, de::string_value, record.device_id, text);
        write_back(&mut raw, USER_ID, de::string_value, record.user_id, text);
        write_back(&mut raw, NICKNAME, de::string_value, record.nickname, text);
        write_back(&mut raw, WEIGHT, de::f64_value, record.weight, |w| w.and_then(number));
        write_back(&mut raw, HEIGHT, de::f64_value, record.height, |h| h.and_then(number));
        write_back(&mut raw, RESISTANCE, de::string_value, record.resistance, text);
        write_back(&mut raw, CREATE_TIME, de::i64_value, record.create_time, |t| {
            Some(Value::from(t))
        });
        write_back(&mut raw, ANALYSIS_REPORT, decode_report, record.analysis_report, |r| {
            r.and_then(|r| serde_json::to_value(r).ok())
        });
        raw
    }
}

impl ScaleRecord {
    /// Resistance is present, non-empty and not `"0"`.
    pub fn has_valid_resistance(&self) -> bool {
        matches!(self.resistance.as_deref().map(str::trim), Some(r) if !r.is_empty() && r != "0")
    }

    /// Analysis input for this record, or `None` when height, weight or
    /// resistance rule out a meaningful report.
    pub fn analysis_request(&self, profile: &UserProfile) -> Option<AnalysisRequest> {
        let height = self.height.filter(|h| *h > 0.0)?;
        let weight = self.weight.filter(|w| *w > 0.0)?;
        if !self.has_valid_resistance() {
            return None;
        }
        Some(AnalysisRequest {
            height,
            weight,
            age: profile.age_at(self.create_time),
            sex: profile.sex.code(),
            resistance: self.resistance.as_deref()?.trim().to_string(),
        })
    }
}

/// Body of `POST /v1.0/scales/{id}/analysis-reports`. Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRequest {
    pub height: f64,
    pub weight: f64,
    pub age: u32,
    pub sex: u8,
    pub resistance: String,
}

/// Body-composition metrics computed by the cloud.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Body fat percentage
    #[serde(alias = "body_fat", default, deserialize_with = "de::opt_f64", skip_serializing_if = "Option::is_none")]
    pub fat: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64", skip_serializing_if = "Option::is_none")]
    pub bmi: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64", skip_serializing_if = "Option::is_none")]
    pub body_age: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64", skip_serializing_if = "Option::is_none")]
    pub body_score: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64", skip_serializing_if = "Option::is_none")]
    pub body_type: Option<f64>,
    /// Bone mass, kg
    #[serde(default, deserialize_with = "de::opt_f64", skip_serializing_if = "Option::is_none")]
    pub bones: Option<f64>,
    /// Fat-free mass, kg
    #[serde(default, deserialize_with = "de::opt_f64", skip_serializing_if = "Option::is_none")]
    pub ffm: Option<f64>,
    /// Muscle mass, kg
    #[serde(default, deserialize_with = "de::opt_f64", skip_serializing_if = "Option::is_none")]
    pub muscle: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64", skip_serializing_if = "Option::is_none")]
    pub protein: Option<f64>,
    /// Basal metabolism, kcal
    #[serde(default, deserialize_with = "de::opt_f64", skip_serializing_if = "Option::is_none")]
    pub metabolism: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64", skip_serializing_if = "Option::is_none")]
    pub visceral_fat: Option<f64>,
    /// Body water percentage
    #[serde(default, deserialize_with = "de::opt_f64", skip_serializing_if = "Option::is_none")]
    pub water: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A person seen on the scale, inferred from measurement records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleUser {
    pub user_id: String,
    pub nickname: Option<String>,
}

/// Latest measurement of one user, possibly with its analysis report attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestMeasurement {
    pub user_id: String,
    pub nickname: Option<String>,
    pub record: ScaleRecord,
}

/// Device metadata from `GET /v1.0/devices/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(default, deserialize_with = "de::string")]
    pub id: String,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub custom_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub product_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub product_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub category: Option<String>,
    #[serde(default)]
    pub online: Option<bool>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub time_zone: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceInfo {
    /// Custom name, then name, then a generic label.
    pub fn display_name(&self) -> &str {
        self.custom_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.name.as_deref().filter(|n| !n.is_empty()))
            .unwrap_or("Tuya Smart Scale")
    }
}

/// Distinct users in first-seen order, ignoring empty and `"0"` ids.
pub fn discover_users(records: &[ScaleRecord]) -> Vec<ScaleUser> {
    let mut seen = HashSet::new();
    let mut users = Vec::new();
    for record in records {
        let Some(user_id) = record.user_id.as_deref() else {
            continue;
        };
        if user_id.trim().is_empty() || user_id == "0" || !seen.insert(user_id) {
            continue;
        }
        users.push(ScaleUser {
            user_id: user_id.to_string(),
            nickname: record.nickname.clone(),
        });
    }
    users
}

mod de {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub(super) fn f64_value(value: Option<&Value>) -> Option<f64> {
        match value? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub(super) fn u64_value(value: Option<&Value>) -> Option<u64> {
        match value? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub(super) fn i64_value(value: Option<&Value>) -> i64 {
        match value {
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
        .unwrap_or_default()
    }

    pub(super) fn string_value(value: Option<&Value>) -> Option<String> {
        match value? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub(super) fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(f64_value(Option::<Value>::deserialize(d)?.as_ref()))
    }

    pub(super) fn opt_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        Ok(u64_value(Option::<Value>::deserialize(d)?.as_ref()))
    }

    pub(super) fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(string_value(Option::<Value>::deserialize(d)?.as_ref()))
    }

    pub(super) fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(opt_string(d)?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Sex;
    use serde_json::json;

    fn record(value: Value) -> ScaleRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn record_decodes_wire_names_and_loose_types() {
        let rec = record(json!({
            "id": 991,
            "device_id": "dev1",
            "user_id": "u1",
            "nick_name": "Alex",
            "wegith": "65.3",
            "height": 170,
            "body_r": 550,
            "create_time": "1700000000000",
            "bmi_level": 2
        }));
        assert_eq!(rec.id, "991");
        assert_eq!(rec.nickname.as_deref(), Some("Alex"));
        assert_eq!(rec.weight, Some(65.3));
        assert_eq!(rec.height, Some(170.0));
        assert_eq!(rec.resistance.as_deref(), Some("550"));
        assert_eq!(rec.create_time, 1_700_000_000_000);
        assert_eq!(rec.raw.get("bmi_level"), Some(&json!(2)));
    }

    #[test]
    fn record_accepts_corrected_spellings() {
        let rec = record(json!({"weight": 70.1, "nickname": "Sam"}));
        assert_eq!(rec.weight, Some(70.1));
        assert_eq!(rec.nickname.as_deref(), Some("Sam"));
        assert_eq!(rec.create_time, 0);
    }

    #[test]
    fn record_writes_back_wire_values_unchanged() {
        let wire = json!({
            "id": 12,
            "wegith": "65.30",
            "height": "170",
            "body_r": 550,
            "create_time": "5",
            "vendor_field": {"a": 1},
            "analysis_report": {"fat": "18.5", "skeletal": 3}
        });
        let rec = record(wire.clone());
        assert_eq!(rec.id, "12");
        assert_eq!(rec.weight, Some(65.3));
        assert_eq!(rec.height, Some(170.0));
        assert_eq!(rec.create_time, 5);
        assert_eq!(rec.analysis_report.as_ref().and_then(|r| r.fat), Some(18.5));

        assert_eq!(serde_json::to_value(&rec).unwrap(), wire);
    }

    #[test]
    fn changed_fields_replace_wire_values() {
        let mut rec = record(json!({
            "id": "r1",
            "wegith": "65.30",
            "nickname": "Sam",
            "body_r": "550",
            "create_time": 5
        }));
        rec.weight = Some(70.0);
        rec.nickname = None;
        rec.analysis_report = Some(AnalysisReport {
            fat: Some(20.0),
            ..Default::default()
        });

        let out = serde_json::to_value(&rec).unwrap();
        assert_eq!(out["wegith"], json!(70.0));
        assert!(out.get("nickname").is_none());
        assert_eq!(out["body_r"], "550");
        assert_eq!(out["analysis_report"], json!({"fat": 20.0}));
    }

    #[test]
    fn built_record_serializes_typed_fields() {
        let rec = ScaleRecord {
            id: "r2".into(),
            height: Some(170.0),
            create_time: 9,
            ..Default::default()
        };
        let out = serde_json::to_value(&rec).unwrap();
        assert_eq!(out, json!({"id": "r2", "height": 170.0, "create_time": 9}));
    }

    #[test]
    fn odd_nickname_does_not_lose_the_page() {
        let page: HistoryPage = serde_json::from_value(json!({
            "records": [
                {"id": "a", "user_id": "u1", "nick_name": 7, "create_time": 2},
                {"id": "b", "user_id": "u2", "nick_name": "B", "create_time": 1}
            ],
            "total": 2
        }))
        .unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].nickname.as_deref(), Some("7"));
        assert_eq!(page.records[1].nickname.as_deref(), Some("B"));
        assert_eq!(discover_users(&page.records).len(), 2);
    }

    #[test]
    fn resistance_validity() {
        let mut rec = ScaleRecord::default();
        assert!(!rec.has_valid_resistance());
        for invalid in ["0", "", " "] {
            rec.resistance = Some(invalid.into());
            assert!(!rec.has_valid_resistance(), "{:?}", invalid);
        }
        rec.resistance = Some("550".into());
        assert!(rec.has_valid_resistance());
    }

    #[test]
    fn analysis_request_requires_all_inputs() {
        let profile = UserProfile::new(30, Sex::Male);
        let mut rec = ScaleRecord {
            height: Some(170.0),
            weight: Some(65.0),
            resistance: Some("550".into()),
            ..Default::default()
        };
        let req = rec.analysis_request(&profile).unwrap();
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"height":170.0,"weight":65.0,"age":30,"sex":1,"resistance":"550"}"#
        );

        rec.resistance = Some("0".into());
        assert!(rec.analysis_request(&profile).is_none());

        rec.resistance = Some("550".into());
        rec.height = Some(0.0);
        assert!(rec.analysis_request(&profile).is_none());

        rec.height = Some(170.0);
        rec.weight = None;
        assert!(rec.analysis_request(&profile).is_none());
    }

    #[test]
    fn users_are_discovered_in_first_seen_order() {
        let records: Vec<ScaleRecord> = serde_json::from_value(json!([
            {"user_id": "u2", "nick_name": "Sam"},
            {"user_id": "0", "nick_name": "Guest"},
            {"user_id": "u1", "nick_name": "Alex"},
            {"user_id": "u2", "nick_name": "Samuel"},
            {"user_id": "  "},
            {"nick_name": "Nobody"}
        ]))
        .unwrap();
        let users = discover_users(&records);
        assert_eq!(
            users,
            vec![
                ScaleUser {
                    user_id: "u2".into(),
                    nickname: Some("Sam".into())
                },
                ScaleUser {
                    user_id: "u1".into(),
                    nickname: Some("Alex".into())
                },
            ]
        );
    }

    #[test]
    fn history_page_requires_records_list() {
        let page: HistoryPage =
            serde_json::from_value(json!({"records": [{"id": "a"}], "total": "150"})).unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.total, Some(150));

        assert!(serde_json::from_value::<HistoryPage>(json!({"total": 1})).is_err());
        assert!(serde_json::from_value::<HistoryPage>(json!({"records": {"a": 1}})).is_err());
    }

    #[test]
    fn device_display_name_prefers_custom_name() {
        let info: DeviceInfo = serde_json::from_value(json!({
            "id": "dev1", "name": "Scale", "custom_name": "Bathroom", "icon": "x.png"
        }))
        .unwrap();
        assert_eq!(info.display_name(), "Bathroom");
        assert_eq!(info.extra.get("icon"), Some(&json!("x.png")));
        assert_eq!(DeviceInfo::default().display_name(), "Tuya Smart Scale");
    }
}
