use std::io::Write;

use dossier_core::{
    ChronologyEntry, Connections, CorpusMatchIndex, Dossier, EntityMatch, EntityType,
    MatchNavigator, ScanSummary,
};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn type_label(entity_type: &EntityType, color: ColorMode) -> String {
    let label = format!("{:<13}", entity_type.as_str());
    if !color.enabled() {
        return label;
    }
    match entity_type.as_str() {
        "people" => label.cyan().to_string(),
        "places" => label.green().to_string(),
        "organizations" => label.magenta().to_string(),
        "dates" => label.yellow().to_string(),
        "custom" => label.red().to_string(),
        _ => label.blue().to_string(),
    }
}

fn location(m: &EntityMatch) -> String {
    match m.geometry {
        Some(g) => format!(
            "({:.1}, {:.1}) {:.1}x{:.1}",
            g.left, g.top, g.width, g.height
        ),
        None => "unresolved".to_string(),
    }
}

/// Print a warning line.
pub fn print_warning(w: &mut dyn Write, message: &str, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{} {}", "WARNING:".yellow(), message)
    } else {
        writeln!(w, "WARNING: {}", message)
    }
}

/// Print every match in navigation order, walking the navigator once round.
pub fn print_matches(
    w: &mut dyn Write,
    corpus: &CorpusMatchIndex,
    nav: &mut MatchNavigator,
    color: ColorMode,
) -> std::io::Result<()> {
    if nav.is_empty() {
        writeln!(w, "No matches.")?;
        return Ok(());
    }

    let total = nav.len();
    let mut last_doc = None;
    for _ in 0..total {
        let Some(((pos, _), m)) = nav.position().zip(nav.current(corpus)) else {
            break;
        };
        if last_doc != Some(m.document_index) {
            last_doc = Some(m.document_index);
            let title = corpus.document_title(m.document_index);
            writeln!(w)?;
            if color.enabled() {
                writeln!(w, "{}", title.bold())?;
            } else {
                writeln!(w, "{}", title)?;
            }
        }
        let loc = location(m);
        let loc = if color.enabled() {
            loc.dimmed().to_string()
        } else {
            loc
        };
        writeln!(
            w,
            "  [{}/{}] {} {:<24} p.{:<4} {}",
            pos + 1,
            total,
            type_label(&m.entity_type, color),
            m.text,
            m.page_number,
            loc
        )?;
        nav.next();
    }
    Ok(())
}

/// Print the per-type entity summary.
pub fn print_dossier(w: &mut dyn Write, dossier: &Dossier, color: ColorMode) -> std::io::Result<()> {
    if dossier.is_empty() {
        writeln!(w, "No entities with sentence context.")?;
        return Ok(());
    }

    let sep = "=".repeat(60);
    for section in &dossier.sections {
        writeln!(w)?;
        let heading = section.entity_type.as_str().to_uppercase();
        if color.enabled() {
            writeln!(w, "{}", sep.bold())?;
            writeln!(w, "{} ({})", heading.bold(), section.entries.len())?;
            writeln!(w, "{}", sep.bold())?;
        } else {
            writeln!(w, "{}", sep)?;
            writeln!(w, "{} ({})", heading, section.entries.len())?;
            writeln!(w, "{}", sep)?;
        }

        for entry in &section.entries {
            writeln!(w)?;
            let count = format!("{} mention(s)", entry.mentions.len());
            if color.enabled() {
                writeln!(w, "{}  {}", entry.text.bold(), count.dimmed())?;
            } else {
                writeln!(w, "{}  {}", entry.text, count)?;
            }
            for mention in &entry.mentions {
                if color.enabled() {
                    writeln!(
                        w,
                        "  - \"{}\" {}",
                        mention.sentence,
                        format!("[{}]", mention.document_title).dimmed()
                    )?;
                } else {
                    writeln!(w, "  - \"{}\" [{}]", mention.sentence, mention.document_title)?;
                }
            }
        }
    }
    Ok(())
}

/// Print document pairs and the entities that link them.
pub fn print_connections(
    w: &mut dyn Write,
    corpus: &CorpusMatchIndex,
    connections: &Connections,
    color: ColorMode,
) -> std::io::Result<()> {
    if connections.is_empty() {
        writeln!(w, "No entities shared between documents.")?;
        return Ok(());
    }

    for pair in &connections.pairs {
        let heading = format!(
            "{} <-> {}",
            corpus.document_title(pair.first),
            corpus.document_title(pair.second)
        );
        writeln!(w)?;
        if color.enabled() {
            writeln!(w, "{}", heading.bold())?;
        } else {
            writeln!(w, "{}", heading)?;
        }
        for text in &pair.shared {
            writeln!(w, "  - {}", text)?;
        }
    }

    writeln!(w)?;
    for entity in &connections.shared {
        let docs: Vec<String> = entity
            .documents
            .iter()
            .map(|d| corpus.document_title(*d))
            .collect();
        writeln!(
            w,
            "{} {}  {}",
            type_label(&entity.entity_type, color),
            entity.text,
            docs.join(", ")
        )?;
    }
    Ok(())
}

/// Print the dated sentences, oldest first.
pub fn print_chronology(
    w: &mut dyn Write,
    entries: &[ChronologyEntry],
    color: ColorMode,
) -> std::io::Result<()> {
    if entries.is_empty() {
        writeln!(w, "No dated events found.")?;
        return Ok(());
    }
    for entry in entries {
        let source = format!("(Source: {}, p.{})", entry.document_title, entry.page_number);
        if color.enabled() {
            writeln!(
                w,
                "{:<10}  {} {}",
                entry.date.to_string().yellow(),
                entry.sentence,
                source.dimmed()
            )?;
        } else {
            writeln!(w, "{:<10}  {} {}", entry.date.to_string(), entry.sentence, source)?;
        }
    }
    Ok(())
}

/// Print the end-of-scan summary.
pub fn print_summary(
    w: &mut dyn Write,
    corpus: &CorpusMatchIndex,
    summary: &ScanSummary,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w)?;
    let sep = "=".repeat(60);
    if color.enabled() {
        writeln!(w, "{}", sep.bold())?;
        writeln!(w, "{}", "SUMMARY".bold())?;
        writeln!(w, "{}", sep.bold())?;
    } else {
        writeln!(w, "{}", sep)?;
        writeln!(w, "SUMMARY")?;
        writeln!(w, "{}", sep)?;
    }

    writeln!(w, "  Pages scanned: {}", summary.pages_scanned)?;
    writeln!(w, "  Matches indexed: {}", summary.matches_inserted)?;
    for (entity_type, count) in corpus.count_by_type() {
        writeln!(w, "    {}: {}", entity_type, count)?;
    }
    if summary.unresolved > 0 {
        let msg = format!("Unresolved (no position on page): {}", summary.unresolved);
        if color.enabled() {
            writeln!(w, "  {}", msg.dimmed())?;
        } else {
            writeln!(w, "  {}", msg)?;
        }
    }
    if summary.rejected > 0 {
        let msg = format!("Rejected: {}", summary.rejected);
        if color.enabled() {
            writeln!(w, "  {}", msg.dimmed())?;
        } else {
            writeln!(w, "  {}", msg)?;
        }
    }
    if summary.degraded {
        print_warning(w, "tagging service unavailable, results come from pattern matching", color)?;
    }
    if summary.cancelled {
        if color.enabled() {
            writeln!(w, "  {}", "Scan cancelled, results are partial.".yellow())?;
        } else {
            writeln!(w, "  Scan cancelled, results are partial.")?;
        }
    }
    writeln!(w)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_core::{Geometry, TypeFilter};

    fn corpus() -> CorpusMatchIndex {
        let mut corpus = CorpusMatchIndex::new();
        corpus.register_document(0, "report.pdf");
        corpus.insert([
            EntityMatch::new("Alice", EntityType::people(), 0, 1, 0, 5).with_geometry(Some(
                Geometry {
                    left: 10.0,
                    top: 88.0,
                    width: 30.0,
                    height: 12.0,
                },
            )),
            EntityMatch::new("Paris", EntityType::places(), 0, 1, 14, 5)
                .with_sentence("Alice went to Paris."),
        ]);
        corpus
    }

    #[test]
    fn matches_listed_in_order_without_color() {
        let corpus = corpus();
        let mut nav = MatchNavigator::new(&corpus);
        let mut out = Vec::new();
        print_matches(&mut out, &corpus, &mut nav, ColorMode(false)).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("report.pdf"));
        let alice = text.find("Alice").unwrap();
        let paris = text.find("Paris").unwrap();
        assert!(alice < paris);
        assert!(text.contains("[2/2]"));
        assert!(text.contains("unresolved"));
        // One full lap leaves the cursor where it started.
        assert_eq!(nav.position(), Some((0, 2)));
    }

    #[test]
    fn dossier_lists_mentions() {
        let corpus = corpus();
        let mut out = Vec::new();
        print_dossier(&mut out, &corpus.dossier(&TypeFilter::All), ColorMode(false)).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("PLACES (1)"));
        assert!(text.contains("\"Alice went to Paris.\" [report.pdf]"));
        assert!(!text.contains("PEOPLE"));
    }

    #[test]
    fn connections_name_both_documents() {
        let mut corpus = CorpusMatchIndex::new();
        corpus.register_document(0, "a.pdf");
        corpus.register_document(1, "b.pdf");
        corpus.insert([
            EntityMatch::new("Alice", EntityType::people(), 0, 1, 0, 5),
            EntityMatch::new("Alice", EntityType::people(), 1, 3, 8, 5),
        ]);
        let mut out = Vec::new();
        let connections = corpus.connections(&TypeFilter::All);
        print_connections(&mut out, &corpus, &connections, ColorMode(false)).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("a.pdf <-> b.pdf"));
        assert!(text.contains("  - Alice"));
    }

    #[test]
    fn chronology_lines_carry_date_and_source() {
        let mut corpus = corpus();
        corpus.insert([EntityMatch::new("1998", EntityType::dates(), 0, 2, 9, 4)
            .with_sentence("Founded in 1998.")]);
        let mut out = Vec::new();
        print_chronology(&mut out, &corpus.chronology(), ColorMode(false)).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("1998        Founded in 1998. (Source: report.pdf, p.2)"));

        let mut empty = Vec::new();
        print_chronology(&mut empty, &[], ColorMode(false)).unwrap();
        assert_eq!(String::from_utf8(empty).unwrap(), "No dated events found.\n");
    }
}
