//! JSON rendering of clustering results.

use anyhow::Result;
use serde::Serialize;

use crate::model::Cluster;
use crate::stages::Renderer;

/// One cluster in the rendered document.
#[derive(Debug, Serialize)]
struct ClusterEntry<'a> {
    /// Cluster label, stringified. Labels are opaque ids, not ranks.
    name: String,

    /// Ids of the member images, in order.
    image_ids: Vec<&'a str>,

    /// Description, or `null` when the describer has not filled it.
    description: Option<&'a str>,
}

/// The rendered document.
#[derive(Debug, Serialize)]
struct Document<'a> {
    clusters: Vec<ClusterEntry<'a>>,
}

/// Renderer that converts clusters into a pretty-printed JSON document:
/// `{ "clusters": [ { "name", "image_ids", "description" } ] }`.
#[derive(Debug, Clone, Default)]
pub struct JsonRenderer;

impl JsonRenderer {
    /// Create a new JSON renderer.
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for JsonRenderer {
    fn render(&self, clusters: &[Cluster]) -> Result<String> {
        let document = Document {
            clusters: clusters
                .iter()
                .map(|cluster| ClusterEntry {
                    name: cluster.label.to_string(),
                    image_ids: cluster.image_ids(),
                    description: cluster.description.as_deref(),
                })
                .collect(),
        };

        Ok(serde_json::to_string_pretty(&document)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ImageItem;
    use image::DynamicImage;
    use pretty_assertions::assert_eq;

    fn item(id: &str) -> ImageItem {
        ImageItem::new(id, DynamicImage::new_rgb8(1, 1))
    }

    #[test]
    fn renders_expected_document_shape() {
        let mut described = Cluster::new(0, vec![item("a.png"), item("b.png")]);
        described.description = Some("two red squares".to_string());
        let clusters = vec![described, Cluster::new(7, vec![item("c.png")])];

        let rendered = JsonRenderer::new().render(&clusters).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        let entries = value["clusters"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["name"], "0");
        assert_eq!(entries[0]["image_ids"], serde_json::json!(["a.png", "b.png"]));
        assert_eq!(entries[0]["description"], "two red squares");
        assert_eq!(entries[1]["name"], "7");
        assert!(entries[1]["description"].is_null());
    }

    #[test]
    fn empty_input_renders_empty_list() {
        let rendered = JsonRenderer::new().render(&[]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["clusters"].as_array().unwrap().len(), 0);
    }
}
