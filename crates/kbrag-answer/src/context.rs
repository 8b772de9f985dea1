use kbrag_core::types::Chunk;

/// Render chunks as prompt context, one `Source:` block per chunk, blank line between.
pub fn format_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|c| match c.page {
            Some(page) if page > 0 => format!("Source: {} (page {})\n{}", c.file_name(), page, c.text),
            _ => format!("Source: {}\n{}", c.file_name(), c.text),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str, page: Option<u32>, text: &str) -> Chunk {
        Chunk { id: "x:0".into(), text: text.into(), source_path: source.into(), page, chunk_index: 0 }
    }

    #[test]
    fn pages_and_file_names() {
        let out = format_context(&[
            chunk("/data/raw/handbook.pdf", Some(4), "PTO is 20 days."),
            chunk("/data/raw/remote.txt", None, "Remote twice a week."),
            chunk("", Some(0), "orphan"),
        ]);
        assert_eq!(
            out,
            "Source: handbook.pdf (page 4)\nPTO is 20 days.\n\nSource: remote.txt\nRemote twice a week.\n\nSource: unknown\norphan"
        );
    }

    #[test]
    fn no_chunks_is_empty_context() {
        assert_eq!(format_context(&[]), "");
    }
}
