//! Dashboard analytics: response shapes and the small amount of math behind
//! them (percentages, month-over-month trend, grouping).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::clock;
use crate::model::{
    Archivador, Document, Expediente, FlowStatus, OcrStatus, Signature, SignatureFlow,
    SignatureStatus, Typology, User,
};
use crate::vitals::{VitalRating, WebVitalPayload};

/// Share of `count` in `total` as a percentage rounded to one decimal.
pub fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1(count as f64 * 100.0 / total as f64)
}

/// Relative change from `previous` to `current`, in percent, one decimal.
///
/// From zero: 100 when anything appeared, 0 when both are zero.
pub fn trend(current: u64, previous: u64) -> f64 {
    if previous == 0 {
        return if current > 0 { 100.0 } else { 0.0 };
    }
    round1((current as f64 - previous as f64) * 100.0 / previous as f64)
}

/// Arithmetic mean rounded to one decimal; 0 for an empty set.
pub fn average(sum: u64, count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    round1(sum as f64 / count as f64)
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Count items by key, keeping keys sorted.
pub fn count_by<T, K, F>(items: &[T], key: F) -> BTreeMap<K, u64>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut out = BTreeMap::new();
    for item in items {
        *out.entry(key(item)).or_insert(0) += 1;
    }
    out
}

/// The `n` most recent `YYYY-MM` month keys ending at (and including)
/// `year`/`month`, oldest first.
pub fn trailing_months(year: i32, month: u8, n: usize) -> Vec<String> {
    let mut keys = Vec::with_capacity(n);
    let (mut y, mut m) = (year, month as i32);
    for _ in 0..n {
        keys.push(format!("{:04}-{:02}", y, m));
        m -= 1;
        if m == 0 {
            m = 12;
            y -= 1;
        }
    }
    keys.reverse();
    keys
}

// ──────────────────────────────────────────────
// Response shapes
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthCount {
    pub month: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrBreakdown {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub error: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAnalytics {
    pub total: u64,
    pub this_month: u64,
    pub last_month: u64,
    pub trend_percent: f64,
    pub by_ocr_status: OcrBreakdown,
    pub by_month: Vec<MonthCount>,
    pub total_size_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodCount {
    pub year: i32,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    pub id: String,
    pub name: String,
    pub document_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivadorStats {
    pub total: u64,
    pub with_documents: u64,
    pub empty: u64,
    pub average_documents: f64,
    pub by_period: Vec<PeriodCount>,
    pub top: Vec<RankedEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpedienteStats {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub average_documents: f64,
}

/// One row of the typology breakdown. Grouped by typology it carries `id`
/// and `name`; grouped by period it carries `year` only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypologyStat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypologyGrouping {
    #[default]
    Typology,
    Period,
}

impl TypologyGrouping {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypologyGrouping::Typology => "typology",
            TypologyGrouping::Period => "period",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total: u64,
    pub active: u64,
    pub by_role: BTreeMap<String, u64>,
    pub top_uploaders: Vec<RankedEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStats {
    pub total: u64,
    pub valid: u64,
    pub reverted: u64,
    pub flows_by_status: BTreeMap<String, u64>,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalSummary {
    pub name: String,
    pub samples: u64,
    pub average: f64,
    pub good: u64,
    pub needs_improvement: u64,
    pub poor: u64,
}

// ──────────────────────────────────────────────
// Computations
// ──────────────────────────────────────────────

const TOP_N: usize = 5;

/// Document totals, OCR breakdown and the 12-month series ending at
/// `year`/`month`.
pub fn document_analytics(docs: &[Document], year: i32, month: u8) -> DocumentAnalytics {
    let months = trailing_months(year, month, 12);
    let per_month = count_by(docs, |d| clock::month_key(&d.created_at));
    let count_for = |key: &str| per_month.get(&Some(key.to_string())).copied().unwrap_or(0);

    let this_month = months.last().map(|k| count_for(k)).unwrap_or(0);
    let last_month = months
        .len()
        .checked_sub(2)
        .map(|i| count_for(&months[i]))
        .unwrap_or(0);

    let mut by_ocr_status = OcrBreakdown::default();
    for d in docs {
        match d.ocr_status {
            OcrStatus::Pending => by_ocr_status.pending += 1,
            OcrStatus::Processing => by_ocr_status.processing += 1,
            OcrStatus::Completed => by_ocr_status.completed += 1,
            OcrStatus::Error => by_ocr_status.error += 1,
        }
    }

    DocumentAnalytics {
        total: docs.len() as u64,
        this_month,
        last_month,
        trend_percent: trend(this_month, last_month),
        by_ocr_status,
        by_month: months
            .iter()
            .map(|k| MonthCount {
                month: k.clone(),
                count: count_for(k),
            })
            .collect(),
        total_size_bytes: docs.iter().filter_map(|d| d.file.as_ref()).map(|f| f.size).sum(),
    }
}

fn top_by_count(mut entries: Vec<RankedEntry>) -> Vec<RankedEntry> {
    entries.sort_by(|a, b| {
        b.document_count
            .cmp(&a.document_count)
            .then_with(|| a.name.cmp(&b.name))
    });
    entries.truncate(TOP_N);
    entries
}

/// Archivador totals. `document_count` must already be derived.
pub fn archivador_stats(archivadores: &[Archivador]) -> ArchivadorStats {
    let total = archivadores.len() as u64;
    let with_documents = archivadores.iter().filter(|a| a.document_count > 0).count() as u64;
    let doc_sum: u64 = archivadores.iter().map(|a| a.document_count).sum();

    let by_period = count_by(archivadores, |a| a.period)
        .into_iter()
        .map(|(year, count)| PeriodCount { year, count })
        .collect();

    let top = top_by_count(
        archivadores
            .iter()
            .filter(|a| a.document_count > 0)
            .map(|a| RankedEntry {
                id: a.id.clone(),
                name: a.name.clone(),
                document_count: a.document_count,
            })
            .collect(),
    );

    ArchivadorStats {
        total,
        with_documents,
        empty: total - with_documents,
        average_documents: average(doc_sum, total),
        by_period,
        top,
    }
}

pub fn expediente_stats(expedientes: &[Expediente]) -> ExpedienteStats {
    let total = expedientes.len() as u64;
    let doc_sum: u64 = expedientes.iter().map(|e| e.document_count).sum();
    ExpedienteStats {
        total,
        by_status: count_by(expedientes, |e| e.status.as_str().to_string()),
        average_documents: average(doc_sum, total),
    }
}

/// Typology distribution of documents.
///
/// By typology: one row per typology with at least one document, most used
/// first. By period: one row per archivador year, newest first. Percentages
/// are over the documents counted in the rows.
pub fn typology_stats(
    docs: &[Document],
    typologies: &[Typology],
    archivadores: &[Archivador],
    grouping: TypologyGrouping,
) -> Vec<TypologyStat> {
    match grouping {
        TypologyGrouping::Typology => {
            let counts = count_by(docs, |d| d.typology_id.clone());
            let mut rows: Vec<TypologyStat> = typologies
                .iter()
                .filter_map(|t| {
                    let count = counts.get(&Some(t.id.clone())).copied().unwrap_or(0);
                    (count > 0).then(|| TypologyStat {
                        id: Some(t.id.clone()),
                        name: Some(t.name.clone()),
                        year: None,
                        count,
                        percentage: 0.0,
                    })
                })
                .collect();
            let total: u64 = rows.iter().map(|r| r.count).sum();
            for r in &mut rows {
                r.percentage = percentage(r.count, total);
            }
            rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
            rows
        }
        TypologyGrouping::Period => {
            let periods: BTreeMap<&str, i32> = archivadores
                .iter()
                .map(|a| (a.id.as_str(), a.period))
                .collect();
            let counts = count_by(docs, |d| periods.get(d.archivador_id.as_str()).copied());
            let total: u64 = counts
                .iter()
                .filter(|(year, _)| year.is_some())
                .map(|(_, c)| *c)
                .sum();
            counts
                .into_iter()
                .rev()
                .filter_map(|(year, count)| {
                    year.map(|y| TypologyStat {
                        id: None,
                        name: None,
                        year: Some(y),
                        count,
                        percentage: percentage(count, total),
                    })
                })
                .collect()
        }
    }
}

pub fn user_stats(users: &[User], docs: &[Document]) -> UserStats {
    let uploads = count_by(docs, |d| d.created_by.clone());
    let top_uploaders = top_by_count(
        users
            .iter()
            .filter_map(|u| {
                let count = uploads.get(&u.id).copied().unwrap_or(0);
                (count > 0).then(|| RankedEntry {
                    id: u.id.clone(),
                    name: u.name.clone(),
                    document_count: count,
                })
            })
            .collect(),
    );
    UserStats {
        total: users.len() as u64,
        active: users.iter().filter(|u| u.is_active).count() as u64,
        by_role: count_by(users, |u| u.role.as_str().to_string()),
        top_uploaders,
    }
}

pub fn signature_stats(signatures: &[Signature], flows: &[SignatureFlow]) -> SignatureStats {
    let completed = flows
        .iter()
        .filter(|f| f.status == FlowStatus::Completed)
        .count() as u64;
    SignatureStats {
        total: signatures.len() as u64,
        valid: signatures
            .iter()
            .filter(|s| s.status == SignatureStatus::Valid && !s.is_reverted)
            .count() as u64,
        reverted: signatures.iter().filter(|s| s.is_reverted).count() as u64,
        flows_by_status: count_by(flows, |f| f.status.as_str().to_string()),
        completion_rate: percentage(completed, flows.len() as u64),
    }
}

/// Per-metric summary of collected web-vitals samples, by metric name.
pub fn summarize_vitals(samples: &[WebVitalPayload]) -> Vec<VitalSummary> {
    let mut by_name: BTreeMap<&str, VitalSummary> = BTreeMap::new();
    let mut sums: BTreeMap<&str, f64> = BTreeMap::new();
    for s in samples {
        let entry = by_name.entry(s.name.as_str()).or_insert_with(|| VitalSummary {
            name: s.name.clone(),
            ..Default::default()
        });
        entry.samples += 1;
        match s.rating {
            VitalRating::Good => entry.good += 1,
            VitalRating::NeedsImprovement => entry.needs_improvement += 1,
            VitalRating::Poor => entry.poor += 1,
        }
        *sums.entry(s.name.as_str()).or_insert(0.0) += s.value;
    }
    by_name
        .into_iter()
        .map(|(name, mut summary)| {
            let sum = sums.get(name).copied().unwrap_or(0.0);
            summary.average = (sum / summary.samples as f64 * 1000.0).round() / 1000.0;
            summary
        })
        .collect()
}
