//! Main entry point for the farzip CLI application.
//!
//! Lists and extracts ZIP archives from both local filesystem and remote
//! HTTP URLs, touching only the byte ranges each operation needs.

use anyhow::Result;
use clap::Parser;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use farzip::{ArchiveReader, Cli, FileEntry, HttpRangeSource, LocalFileSource, RangeSource};

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.is_http_url() {
        // Remote ZIP file via HTTP Range requests
        let source = Arc::new(HttpRangeSource::new(cli.file.clone())?);
        process_zip(source.clone(), &cli)?;

        // Display network transfer statistics for HTTP sources
        if !cli.is_quiet() {
            eprintln!(
                "\nTotal bytes transferred: {}",
                format_size(source.transferred_bytes())
            );
        }
    } else {
        // Local ZIP file
        let source = Arc::new(LocalFileSource::new(Path::new(&cli.file))?);
        process_zip(source, &cli)?;
    }

    Ok(())
}

/// Process a ZIP archive based on CLI options.
///
/// List mode (`-l` or `-v`) displays archive contents; extract mode streams
/// the members matching the CLI filters to disk or stdout.
fn process_zip<R: RangeSource + 'static>(source: Arc<R>, cli: &Cli) -> Result<()> {
    let reader = ArchiveReader::new(source)?;

    if cli.list || cli.verbose {
        return list_files(&reader, cli.verbose);
    }

    // Apply filters to determine which files to extract:
    // 1. Skip directories (created automatically during extraction)
    // 2. If specific files are requested, only include matching entries
    // 3. Exclude files matching the exclusion patterns
    let files_to_extract: Vec<&FileEntry> = reader
        .entries()
        .filter(|e| {
            if e.is_directory {
                return false;
            }

            if !cli.files.is_empty() {
                let matches = cli.files.iter().any(|f| {
                    if has_glob_chars(f) {
                        glob_match(f, &e.name)
                    } else {
                        // No wildcards: exact match on filename or full path
                        let basename = Path::new(&e.name)
                            .file_name()
                            .map(|s| s.to_string_lossy())
                            .unwrap_or_default();
                        e.name == *f || basename == *f
                    }
                });
                if !matches {
                    return false;
                }
            }

            if cli
                .exclude
                .iter()
                .any(|x| e.name.contains(x) || glob_match(x, &e.name))
            {
                return false;
            }

            true
        })
        .collect();

    let multiple_files = cli.pipe && files_to_extract.len() > 1;
    for entry in files_to_extract {
        extract_file(&reader, entry, cli, multiple_files)?;
    }

    Ok(())
}

/// List files in the ZIP archive.
///
/// Simple format (`-l`) prints one name per line; verbose format (`-v`)
/// prints a table with sizes, compression ratio, and timestamps.
fn list_files<R: RangeSource>(reader: &ArchiveReader<R>, verbose: bool) -> Result<()> {
    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in reader.entries() {
        if verbose {
            let (year, month, day) = entry.mod_date();
            let (hour, minute, _second) = entry.mod_time();

            let ratio = ratio_percent(entry.compressed_size, entry.uncompressed_size);

            println!(
                "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
                entry.uncompressed_size,
                entry.compressed_size,
                ratio,
                year,
                month,
                day,
                hour,
                minute,
                entry.name
            );

            if !entry.is_directory {
                total_uncompressed += entry.uncompressed_size;
                total_compressed += entry.compressed_size;
                file_count += 1;
            }
        } else {
            println!("{}", entry.name);
        }
    }

    if verbose {
        println!("{}", "-".repeat(70));
        let total_ratio = ratio_percent(total_compressed, total_uncompressed);
        println!(
            "{:>10}  {:>10}  {}  {:>21}  {} files",
            total_uncompressed, total_compressed, total_ratio, "", file_count
        );
    }

    Ok(())
}

/// Extract a single file from the archive.
///
/// Handles pipe mode (`-p`), custom output directory (`-d`), junked paths
/// (`-j`), and overwrite control (`-n`, `-o`). Content is streamed straight
/// from the range source, inflated on the fly for DEFLATE members.
fn extract_file<R: RangeSource>(
    reader: &ArchiveReader<R>,
    entry: &FileEntry,
    cli: &Cli,
    show_filename: bool,
) -> Result<()> {
    // Pipe mode: write file contents directly to stdout
    if cli.pipe {
        let mut stdout = io::stdout().lock();
        if show_filename {
            use std::io::Write;
            writeln!(stdout, "--- {} ---", entry.name)?;
        }
        let mut stream = reader.open_member(&entry.name)?;
        io::copy(&mut stream, &mut stdout)?;
        return Ok(());
    }

    let file_name = if cli.junk_paths {
        // Junk paths: use only the base filename, ignore directory structure
        Path::new(&entry.name)
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| entry.name.clone())
    } else {
        entry.name.clone()
    };
    let output_path = match cli.extract_dir {
        Some(ref dir) => PathBuf::from(dir).join(&file_name),
        None => PathBuf::from(&file_name),
    };

    // Handle existing files based on overwrite options
    if output_path.exists() {
        if cli.never_overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (file exists)", entry.name);
            }
            return Ok(());
        }

        if !cli.overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (use -o to overwrite)", entry.name);
            }
            return Ok(());
        }
        // -o flag: overwrite without prompting (fall through to extraction)
    }

    if !cli.is_quiet() {
        println!("  extracting: {}", entry.name);
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut stream = reader.open_member(&entry.name)?;
    let mut file = fs::File::create(&output_path)?;
    io::copy(&mut stream, &mut file)?;

    Ok(())
}

/// Compression ratio as percentage saved.
///
/// Clamped to 0% for members whose compressed form is larger than the
/// original, which DEFLATE produces routinely for incompressible data.
fn ratio_percent(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 {
        format!(
            "{:>4}%",
            100u64.saturating_sub(compressed * 100 / uncompressed)
        )
    } else {
        "  0%".to_string()
    }
}

/// Check if a pattern contains glob wildcard characters.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    // Simple backtracking matcher for the `*` wildcard.
    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            (Some('*'), _) => {
                // Match zero characters (skip the star) or one more
                // character (keep the star).
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_matching() {
        assert!(glob_match("*.txt", "readme.txt"));
        assert!(glob_match("file?.dat", "file1.dat"));
        assert!(glob_match("docs/*", "docs/api.md"));
        assert!(!glob_match("*.txt", "readme.md"));
        assert!(!glob_match("file?.dat", "file12.dat"));
    }

    #[test]
    fn ratio_clamps_expanded_members() {
        // Incompressible data can grow under DEFLATE; never underflow.
        assert_eq!(ratio_percent(50, 43), "   0%");
        assert_eq!(ratio_percent(43, 43), "   0%");
        assert_eq!(ratio_percent(20, 100), "  80%");
        assert_eq!(ratio_percent(0, 43), " 100%");
        assert_eq!(ratio_percent(5, 0), "  0%");
    }

    #[test]
    fn size_formatting() {
        assert_eq!(format_size(500), "500 bytes");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
    }
}
