//! Department → dataset registry, built once at startup.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use ragdesk_core::access::normalize_role;
use serde::Serialize;
use walkdir::WalkDir;

use crate::dataset::Dataset;

/// Shape of a loaded dataset, for diagnostics and the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub department: String,
    pub source: String,
    pub rows: usize,
    pub columns: Vec<String>,
}

/// Read-only after construction. At most one dataset per department.
#[derive(Debug, Default, Clone)]
pub struct DatasetRegistry {
    datasets: BTreeMap<String, Arc<Dataset>>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `<data_dir>/<department>/*.csv`.
    ///
    /// Files are visited in sorted path order and a later file replaces an
    /// earlier one for the same department. Unreadable files are logged and
    /// skipped; a missing directory yields an empty registry.
    pub fn load(data_dir: &Path) -> Self {
        let mut registry = Self::new();
        if !data_dir.is_dir() {
            tracing::info!("📊 No tabular data directory at {}", data_dir.display());
            return registry;
        }

        let entries = WalkDir::new(data_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file());

        for entry in entries {
            let path = entry.path();
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase())
                .unwrap_or_default();
            if !matches!(ext.as_str(), "csv" | "xlsx" | "xls") {
                continue;
            }

            let Some(department) = department_of(data_dir, path) else {
                tracing::warn!(
                    "⚠️ {} is not inside a department folder, skipped",
                    path.display()
                );
                continue;
            };

            if ext != "csv" {
                tracing::warn!(
                    "⚠️ Spreadsheet {} for '{department}' skipped: only CSV is supported",
                    path.display()
                );
                continue;
            }

            tracing::info!("📊 Loading CSV: {} for role '{department}'", path.display());
            match Dataset::from_path(&department, path) {
                Ok(ds) => {
                    let (rows, cols) = ds.shape();
                    tracing::info!(
                        "✅ Loaded '{department}' dataset: {rows} rows × {cols} columns {:?}",
                        ds.column_names()
                    );
                    registry.insert(ds);
                }
                Err(e) => tracing::error!("❌ Failed to load dataset for {department}: {e}"),
            }
        }

        tracing::info!(
            "📊 {} tabular datasets loaded: {:?}",
            registry.len(),
            registry.departments()
        );
        registry
    }

    /// Add a dataset, replacing any existing one for its department.
    pub fn insert(&mut self, dataset: Dataset) {
        let department = dataset.department.clone();
        if let Some(previous) = self.datasets.insert(department.clone(), Arc::new(dataset)) {
            tracing::warn!(
                "⚠️ '{department}' dataset from {} replaced by a later file",
                previous.source
            );
        }
    }

    pub fn get(&self, department: &str) -> Option<Arc<Dataset>> {
        self.datasets.get(department).cloned()
    }

    /// Departments in sorted order.
    pub fn departments(&self) -> Vec<String> {
        self.datasets.keys().cloned().collect()
    }

    /// Every dataset, sorted by department.
    pub fn all(&self) -> Vec<Arc<Dataset>> {
        self.datasets.values().cloned().collect()
    }

    pub fn summaries(&self) -> Vec<DatasetSummary> {
        self.datasets
            .values()
            .map(|ds| DatasetSummary {
                department: ds.department.clone(),
                source: ds.source.clone(),
                rows: ds.shape().0,
                columns: ds.column_names().into_iter().map(String::from).collect(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

/// First directory under `root`, lowercased. `None` for files at the root.
fn department_of(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut components = rel.components();
    let first = components.next()?;
    components.next()?;
    let dept = normalize_role(first.as_os_str().to_str()?);
    (!dept.is_empty()).then_some(dept)
}
