use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use greetcard_core::create_dir_path;
use greetcard_core::page::{PageIndex, PageMeta, PageStatus};
use greetcard_core::site::Site;
use image::{ImageFormat, Luma};
use log::debug;
use qrcode::QrCode;

pub fn page_url(base_url: &str, filename: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), filename)
}

/// Dumps both tables, one line per row.
pub fn list(site: &Site, f: &mut impl Write) -> anyhow::Result<()> {
    let rows = site.all_statuses()?;
    writeln!(f, "PageMetadata ({} rows)", rows.len())?;
    writeln!(f, "{:>9}  filename", "pageIndex")?;
    for (meta, _) in &rows {
        writeln!(f, "{:>9}  {}", meta.page_index, meta.filename)?;
    }
    writeln!(f)?;
    writeln!(f, "PageStatus ({} rows)", rows.len())?;
    writeln!(f, "{:>9}  {:<6}  {:<16}  {:<16}  content", "pageIndex", "status", "sender", "receiver")?;
    for (_, status) in &rows {
        write_status(f, status)?;
    }
    Ok(())
}

fn write_status(f: &mut impl Write, status: &PageStatus) -> io::Result<()> {
    writeln!(
        f,
        "{:>9}  {:<6}  {:<16}  {:<16}  {}",
        status.page_index,
        if status.status { "used" } else { "unused" },
        status.sender,
        status.receiver,
        status.content.replace('\n', "\\n"),
    )
}

pub fn urls(site: &Site, base_url: &str, f: &mut impl Write) -> anyhow::Result<()> {
    for page in site.all_pages()? {
        writeln!(f, "{}\t{}\t{}", page.page_index, page.filename, page_url(base_url, &page.filename))?;
    }
    Ok(())
}

pub fn qr_path(dir: &Path, page_index: PageIndex) -> PathBuf {
    dir.join(format!("qr_code_{}.png", page_index))
}

/// Saves one PNG per page encoding its public URL. Returns the number of files written.
pub fn qr_codes(site: &Site, base_url: &str, dir: &Path) -> anyhow::Result<usize> {
    create_dir_path(dir)?;
    let pages = site.all_pages()?;
    for page in &pages {
        let url = page_url(base_url, &page.filename);
        let code = QrCode::new(url.as_bytes()).with_context(|| format!("Cannot encode {}", url))?;
        let path = qr_path(dir, page.page_index);
        code.render::<Luma<u8>>()
            .min_dimensions(200, 200)
            .build()
            .save_with_format(&path, ImageFormat::Png)
            .with_context(|| format!("Cannot save {:?}", path))?;
        debug!("Wrote {:?} for {}", path, url);
    }
    Ok(pages.len())
}

pub fn provisioned(created: &[PageMeta], f: &mut impl Write) -> io::Result<()> {
    for meta in created {
        writeln!(f, "{}\t{}", meta.page_index, meta.filename)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use greetcard_core::config::SiteArgs;
    use greetcard_core::page::Greeting;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_page_url() {
        assert_eq!("https://example.com/a1.html", page_url("https://example.com/", "a1.html"));
        assert_eq!("https://example.com/a1.html", page_url("https://example.com", "a1.html"));
    }

    #[test]
    fn test_list_and_urls() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let site = Site::open(&SiteArgs { pages_dir: dir.path().join("pages"), database: dir.path().join("pages.db") })?;
        let created = site.provision(2)?;
        site.update_page(2, &Greeting::new("Ann", "Bo", "two\nlines"))?;

        let mut out = vec![];
        list(&site, &mut out)?;
        let out = String::from_utf8(out)?;
        assert!(out.contains("PageMetadata (2 rows)"));
        assert!(out.contains(&created[0].filename));
        assert!(out.contains("unused"));
        assert!(out.contains("two\\nlines"));

        let mut out = vec![];
        urls(&site, "https://example.com/", &mut out)?;
        let out = String::from_utf8(out)?;
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(2, lines.len());
        assert_eq!(format!("1\t{0}\thttps://example.com/{0}", created[0].filename), lines[0]);
        Ok(())
    }

    #[test]
    fn test_qr_codes() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let site = Site::open(&SiteArgs { pages_dir: dir.path().join("pages"), database: dir.path().join("pages.db") })?;
        site.provision(3)?;
        let qr_dir = dir.path().join("qr_codes");
        assert_eq!(3, qr_codes(&site, "https://example.com", &qr_dir)?);
        for index in 1..=3 {
            let png = std::fs::read(qr_path(&qr_dir, index))?;
            assert!(png.starts_with(b"\x89PNG\r\n\x1a\n"), "page {}", index);
        }
        assert_eq!(3, std::fs::read_dir(&qr_dir)?.count());
        Ok(())
    }
}
