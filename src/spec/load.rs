use super::document::Document;
use anyhow::Context;
use std::path::Path;

/// Read and normalize a document from disk. `.yaml`/`.yml` files are parsed as
/// YAML, everything else as JSON.
pub fn load_document(file_path: impl AsRef<Path>) -> anyhow::Result<Document> {
    let file_path = file_path.as_ref();
    let content = std::fs::read_to_string(file_path)
        .with_context(|| format!("failed to read {}", file_path.display()))?;
    let is_yaml = matches!(
        file_path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );
    let document = if is_yaml {
        Document::from_yaml_str(&content)
    } else {
        Document::from_json_str(&content)
    };
    document.with_context(|| format!("failed to load {}", file_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_names_the_path() {
        let err = load_document("does/not/exist.yaml").unwrap_err();
        assert!(err.to_string().contains("does/not/exist.yaml"));
    }

    #[test]
    fn invalid_yaml_is_reported_with_context() {
        let err = Document::from_yaml_str("openapi: [unclosed").unwrap_err();
        assert_eq!(err.to_string(), "document is not valid YAML");
    }
}
