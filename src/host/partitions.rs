//! `/host/partitions`, read from the kernel partition table on every request.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use resource_framework::entity::to_json;
use resource_framework::{CollectionModel, Listable, Lookupable, ModelError, ResourceModel};
use serde_json::Value;

use crate::model::Partition;

/// Parse `/proc/partitions`. Sizes there are 1 KiB blocks.
///
/// ```text
/// major minor  #blocks  name
///
///    8        0  488386584 sda
///    8        1     524288 sda1
/// ```
pub fn parse_partitions(text: &str) -> Vec<Partition> {
    text.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let &[_major, _minor, blocks, name] = fields.as_slice() else {
                return None;
            };
            let blocks = blocks.parse::<u64>().ok()?;
            Some(Partition {
                name: name.to_string(),
                path: format!("/dev/{name}"),
                size: blocks * 1024,
            })
        })
        .collect()
}

/// Where partitions are read from.
#[derive(Debug, Clone)]
pub struct PartitionTable {
    path: PathBuf,
}

impl Default for PartitionTable {
    fn default() -> Self {
        Self::from_path("/proc/partitions")
    }
}

impl PartitionTable {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn read(&self) -> Result<Vec<Partition>, ModelError> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            ModelError::OperationFailed(format!("cannot read {}: {e}", self.path.display()))
        })?;
        Ok(parse_partitions(&text))
    }
}

pub struct PartitionsModel {
    table: Arc<PartitionTable>,
}

impl PartitionsModel {
    pub fn new(table: Arc<PartitionTable>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl Listable for PartitionsModel {
    async fn get_list(&self, _parent: &[String]) -> Result<Vec<String>, ModelError> {
        let mut names: Vec<String> = self.table.read()?.into_iter().map(|p| p.name).collect();
        names.sort();
        Ok(names)
    }
}

impl CollectionModel for PartitionsModel {
    fn kind(&self) -> &'static str {
        "partitions"
    }

    fn as_listable(&self) -> Option<&dyn Listable> {
        Some(self)
    }
}

pub struct PartitionModel {
    table: Arc<PartitionTable>,
}

impl PartitionModel {
    pub fn new(table: Arc<PartitionTable>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl Lookupable for PartitionModel {
    async fn lookup(&self, ident: &[String]) -> Result<Value, ModelError> {
        let [name] = ident else {
            return Err(ModelError::NotFound("partition not found".into()));
        };
        let partition = self
            .table
            .read()?
            .into_iter()
            .find(|p| &p.name == name)
            .ok_or_else(|| ModelError::NotFound(format!("partition '{name}' not found")))?;
        to_json(&partition)
    }
}

impl ResourceModel for PartitionModel {
    fn kind(&self) -> &'static str {
        "partition"
    }

    fn as_lookupable(&self) -> Option<&dyn Lookupable> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = "major minor  #blocks  name\n\n   8        0  488386584 sda\n   8        1     524288 sda1\n 253        0   52428800 dm-0\n";

    #[test]
    fn header_and_blank_lines_are_skipped() {
        let parts = parse_partitions(SAMPLE);
        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts[1],
            Partition {
                name: "sda1".into(),
                path: "/dev/sda1".into(),
                size: 524288 * 1024,
            }
        );
    }

    #[tokio::test]
    async fn models_read_the_table_file() {
        let path = std::env::temp_dir().join(format!("virt-api-partitions-{}", std::process::id()));
        fs::write(&path, SAMPLE).unwrap();
        let table = Arc::new(PartitionTable::from_path(&path));

        let names = PartitionsModel::new(Arc::clone(&table))
            .get_list(&[])
            .await
            .unwrap();
        assert_eq!(names, vec!["dm-0", "sda", "sda1"]);

        let sda = PartitionModel::new(Arc::clone(&table))
            .lookup(&["sda".to_string()])
            .await
            .unwrap();
        assert_eq!(
            sda,
            json!({"name": "sda", "path": "/dev/sda", "size": 488386584u64 * 1024})
        );

        fs::remove_file(&path).unwrap();
        assert!(matches!(
            PartitionsModel::new(table).get_list(&[]).await,
            Err(ModelError::OperationFailed(_))
        ));
    }
}
