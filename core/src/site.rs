use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use parking_lot::Mutex;
use rand::RngCore;

use crate::config::SiteArgs;
use crate::page::{Greeting, PageIndex, PageMeta, PageStatus, PageSummary};
use crate::render::{FormPage, GreetingPage};
use crate::store::PageStore;
use crate::{create_dir_path, PageError, Result};

pub const LANDING_PAGE: &str = "index.html";

/// The directory the generated pages are served from.
#[derive(Clone, Debug)]
pub struct PageDir {
    root: PathBuf,
}

impl PageDir {
    /// Creates the directory if needed and checks that pages can be written into it.
    pub fn create(root: &Path) -> io::Result<Self> {
        create_dir_path(root)?;
        tempfile::NamedTempFile::new_in(root)
            .map_err(|e| io::Error::new(e.kind(), format!("Cannot write into {:?}: {}", root, e)))?;
        Ok(PageDir { root: root.to_path_buf() })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, filename: &str) -> Result<PathBuf> {
        let plain = !filename.is_empty()
            && filename != "."
            && filename != ".."
            && !filename.contains(['/', '\\', '\0']);
        if !plain {
            return Err(PageError::InvalidFilename(filename.to_string()));
        }
        Ok(self.root.join(filename))
    }

    /// Replaces the file through a rename so the static server never sees a partial page.
    pub fn write(&self, filename: &str, html: &str) -> Result<()> {
        let path = self.path_for(filename)?;
        let context = |e: io::Error| io::Error::new(e.kind(), format!("Cannot write {:?}: {}", path, e));
        let mut file = tempfile::NamedTempFile::new_in(&self.root).map_err(context)?;
        file.write_all(html.as_bytes()).map_err(context)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.as_file().set_permissions(std::fs::Permissions::from_mode(0o644)).map_err(context)?;
        }
        file.persist(&path).map_err(|e| context(e.error))?;
        debug!("Wrote {:?}", path);
        Ok(())
    }
}

pub struct Site {
    store: Mutex<PageStore>,
    pages: PageDir,
}

impl Site {
    pub fn open(args: &SiteArgs) -> Result<Self> {
        let pages = PageDir::create(&args.pages_dir)?;
        let store = PageStore::open(&args.database)?;
        info!("Opened {:?} serving from {:?}", args.database, args.pages_dir);
        Ok(Site::new(store, pages))
    }

    pub fn new(store: PageStore, pages: PageDir) -> Self {
        Site { store: Mutex::new(store), pages }
    }

    pub fn pages(&self) -> &PageDir {
        &self.pages
    }

    /// Stores the greeting and regenerates the page. The row is committed only
    /// once the file has been written.
    pub fn update_page(&self, index: PageIndex, greeting: &Greeting) -> Result<PageMeta> {
        let meta = self.store.lock().update_status_then(index, greeting, |meta| {
            self.pages.write(&meta.filename, &GreetingPage { page_index: index, greeting }.to_string())
        })?;
        info!("Page {} updated: {}", index, meta.filename);
        Ok(meta)
    }

    pub fn page_content(&self, index: PageIndex) -> Result<PageStatus> {
        self.store.lock().get_status(index)
    }

    pub fn all_pages(&self) -> Result<Vec<PageSummary>> {
        self.store.lock().list_all()
    }

    pub fn all_statuses(&self) -> Result<Vec<(PageMeta, PageStatus)>> {
        self.store.lock().list_statuses()
    }

    /// Marks every page unused and puts the blank form back in every file.
    pub fn reset_all(&self) -> Result<usize> {
        let changed = self.store.lock().reset_all_then(|pages| {
            for page in pages {
                self.pages.write(&page.filename, &FormPage { page_index: page.page_index }.to_string())?;
                debug!("Reset page {}: {}", page.page_index, page.filename);
            }
            Ok(())
        })?;
        info!("Reset {} page statuses", changed);
        Ok(changed)
    }

    pub fn rebuild_page(&self, index: PageIndex) -> Result<()> {
        let store = self.store.lock();
        let meta = store.get_meta(index)?;
        let status = store.get_status(index)?;
        self.publish(&meta, &status)
    }

    /// Regenerates every file from its row. Returns the number of files written.
    pub fn rebuild_all(&self) -> Result<usize> {
        let store = self.store.lock();
        let rows = store.list_statuses()?;
        for (meta, status) in &rows {
            self.publish(meta, status)?;
        }
        info!("Rebuilt {} pages", rows.len());
        Ok(rows.len())
    }

    fn publish(&self, meta: &PageMeta, status: &PageStatus) -> Result<()> {
        let html = if status.status {
            GreetingPage { page_index: meta.page_index, greeting: &status.greeting() }.to_string()
        } else {
            FormPage { page_index: meta.page_index }.to_string()
        };
        self.pages.write(&meta.filename, &html)
    }

    /// Adds `count` pages after the highest existing index, each with a random
    /// filename and a blank form.
    pub fn provision(&self, count: usize) -> Result<Vec<PageMeta>> {
        let mut store = self.store.lock();
        let mut created = Vec::with_capacity(count);
        let mut page_index = store.next_index()?;
        for _ in 0..count {
            let meta = PageMeta { page_index, filename: random_filename() };
            store.provision_then(&meta, |meta| {
                self.pages.write(&meta.filename, &FormPage { page_index: meta.page_index }.to_string())
            })?;
            info!("Provisioned page {}: {}", meta.page_index, meta.filename);
            created.push(meta);
            page_index += 1;
        }
        Ok(created)
    }
}

fn random_filename() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}.html", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;
    use std::thread;

    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::render::{render_form, render_greeting};

    fn site_with_pages(count: usize) -> (TempDir, Site) {
        let dir = tempdir().unwrap();
        let args = SiteArgs { pages_dir: dir.path().join("pages"), database: dir.path().join("pages.db") };
        let site = Site::open(&args).unwrap();
        site.provision(count).unwrap();
        (dir, site)
    }

    fn read_page(site: &Site, index: PageIndex) -> String {
        let filename = site.store.lock().get_filename(index).unwrap();
        fs::read_to_string(site.pages.path_for(&filename).unwrap()).unwrap()
    }

    #[test]
    fn test_path_for_rejects_escapes() {
        let pages = PageDir { root: PathBuf::from("/srv/pages") };
        assert_eq!(PathBuf::from("/srv/pages/ab12.html"), pages.path_for("ab12.html").unwrap());
        for bad in ["", ".", "..", "../etc/passwd", "a/b.html", "a\\b.html"] {
            assert!(matches!(pages.path_for(bad), Err(PageError::InvalidFilename(_))), "{:?}", bad);
        }
    }

    #[test]
    fn test_provision_writes_forms() {
        let (_dir, site) = site_with_pages(3);
        let pages = site.all_pages().unwrap();
        assert_eq!(vec![1, 2, 3], pages.iter().map(|x| x.page_index).collect::<Vec<_>>());
        for page in &pages {
            assert_eq!(21, page.filename.len());
            assert!(page.filename.ends_with(".html"));
            assert_eq!(render_form(page.page_index), read_page(&site, page.page_index));
        }
        site.provision(2).unwrap();
        assert_eq!(5, site.all_pages().unwrap().len());
    }

    #[test]
    fn test_update_then_content() {
        let (_dir, site) = site_with_pages(2);
        let greeting = Greeting::new("Ann", "Bo", "圣诞快乐");
        site.update_page(2, &greeting).unwrap();
        let status = site.page_content(2).unwrap();
        assert!(status.status);
        assert_eq!(greeting, status.greeting());
        assert_eq!(render_greeting(2, &greeting), read_page(&site, 2));
        assert_eq!(render_form(1), read_page(&site, 1));
    }

    #[test]
    fn test_update_unknown_page_writes_nothing() {
        let (dir, site) = site_with_pages(1);
        let before = fs::read_dir(dir.path().join("pages")).unwrap().count();
        assert!(matches!(site.update_page(7, &Greeting::new("a", "b", "c")), Err(PageError::NotFound(_))));
        assert_eq!(before, fs::read_dir(dir.path().join("pages")).unwrap().count());
    }

    #[test]
    fn test_failed_write_leaves_row_unused() {
        let (_dir, site) = site_with_pages(1);
        let path = site.pages.path_for(&site.store.lock().get_filename(1).unwrap()).unwrap();
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();
        fs::write(path.join("blocker"), "x").unwrap();

        let result = site.update_page(1, &Greeting::new("a", "b", "c"));
        assert!(matches!(result, Err(PageError::Io(_))), "{:?}", result);
        assert!(!site.page_content(1).unwrap().status);

        fs::remove_dir_all(&path).unwrap();
        site.rebuild_page(1).unwrap();
        assert_eq!(render_form(1), read_page(&site, 1));
    }

    #[test]
    fn test_reset_restores_forms() {
        let (_dir, site) = site_with_pages(3);
        site.update_page(1, &Greeting::new("a", "b", "c")).unwrap();
        site.update_page(3, &Greeting::new("d", "e", "f")).unwrap();
        assert_eq!(3, site.reset_all().unwrap());
        for page in site.all_pages().unwrap() {
            assert!(!page.status);
            assert_eq!(render_form(page.page_index), read_page(&site, page.page_index));
        }
    }

    #[test]
    fn test_rebuild_repairs_files() {
        let (_dir, site) = site_with_pages(2);
        let greeting = Greeting::new("Ann", "Bo", "hi");
        site.update_page(1, &greeting).unwrap();
        for page in site.all_pages().unwrap() {
            fs::remove_file(site.pages.path_for(&page.filename).unwrap()).unwrap();
        }
        assert_eq!(2, site.rebuild_all().unwrap());
        assert_eq!(render_greeting(1, &greeting), read_page(&site, 1));
        assert_eq!(render_form(2), read_page(&site, 2));
        fs::write(site.pages.path_for(&site.store.lock().get_filename(1).unwrap()).unwrap(), "stale").unwrap();
        site.rebuild_page(1).unwrap();
        assert_eq!(render_greeting(1, &greeting), read_page(&site, 1));
    }

    #[test]
    fn test_concurrent_updates_are_independent() {
        let (_dir, site) = site_with_pages(8);
        let site = Arc::new(site);
        thread::scope(|s| {
            for index in 1..=8 {
                let site = site.clone();
                s.spawn(move || {
                    let greeting = Greeting::new(format!("s{}", index), format!("r{}", index), format!("c{}", index));
                    site.update_page(index, &greeting).unwrap();
                });
            }
        });
        for index in 1..=8 {
            let status = site.page_content(index).unwrap();
            assert!(status.status);
            assert_eq!(format!("c{}", index), status.content);
            assert_eq!(render_greeting(index, &status.greeting()), read_page(&site, index));
        }
    }
}
