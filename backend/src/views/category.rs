use serde::Serialize;

use super::Notifier;
use crate::models::{Cursor, ListingRecord};
use crate::platform::{ListingQuery, ListingStore};

pub const PAGE_SIZE: usize = 10;

const FETCH_FAILED: &str = "Error while fetching the listings!";

/// Listings of one category, newest first, loaded a page at a time.
pub struct CategoryView {
    category: String,
    page_size: usize,
    listings: Option<Vec<ListingRecord>>,
    loading: bool,
    cursor: Option<Cursor>,
    exhausted: bool,
    resumed: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CategoryBody {
    Loading,
    Empty {
        message: String,
    },
    Listings {
        listings: Vec<ListingRecord>,
        #[serde(skip_serializing_if = "Option::is_none")]
        next_cursor: Option<String>,
    },
}

#[derive(Debug, Serialize)]
pub struct CategoryPage {
    pub title: &'static str,
    pub category: String,
    #[serde(flatten)]
    pub body: CategoryBody,
}

impl CategoryView {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            page_size: PAGE_SIZE,
            listings: None,
            loading: true,
            cursor: None,
            exhausted: false,
            resumed: false,
        }
    }

    /// Picks up where an earlier page ended, without the records already shown.
    pub fn resume(category: impl Into<String>, cursor: Cursor) -> Self {
        Self {
            listings: Some(Vec::new()),
            loading: false,
            cursor: Some(cursor),
            resumed: true,
            ..Self::new(category)
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn title(&self) -> &'static str {
        if self.category == "rent" {
            "Places for Rent"
        } else {
            "Places for Sale"
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// `None` until the first fetch has completed.
    pub fn listings(&self) -> Option<&[ListingRecord]> {
        self.listings.as_deref()
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn has_more(&self) -> bool {
        !self.exhausted && self.cursor.is_some()
    }

    pub async fn fetch(&mut self, store: &dyn ListingStore, notifier: &dyn Notifier) {
        self.loading = true;
        self.cursor = None;
        self.exhausted = false;

        let query = ListingQuery::new(&self.category, self.page_size);
        match store.query(&query).await {
            Ok(page) => {
                log::info!("Fetched {} {} listings", page.len(), self.category);
                self.listings = Some(Vec::new());
                self.absorb(page);
            }
            Err(e) => {
                log::warn!("Failed to fetch {} listings: {}", self.category, e);
                notifier.error(FETCH_FAILED);
            }
        }
        self.loading = false;
    }

    /// Appends the next page. A no-op once pagination has ended.
    pub async fn load_more(&mut self, store: &dyn ListingStore, notifier: &dyn Notifier) {
        let cursor = match (&self.cursor, self.exhausted) {
            (Some(cursor), false) => cursor.clone(),
            _ => return,
        };

        self.loading = true;
        let query = ListingQuery::new(&self.category, self.page_size).start_after(cursor);
        match store.query(&query).await {
            Ok(page) => {
                log::info!("Fetched {} more {} listings", page.len(), self.category);
                self.absorb(page);
            }
            Err(e) => {
                log::warn!("Failed to fetch more {} listings: {}", self.category, e);
                notifier.error(FETCH_FAILED);
            }
        }
        self.loading = false;
    }

    fn absorb(&mut self, page: Vec<ListingRecord>) {
        // An empty page leaves the cursor where it was.
        if let Some(last) = page.last() {
            self.cursor = Some(last.cursor());
        }
        if page.len() < self.page_size {
            self.exhausted = true;
        }
        self.listings.get_or_insert_with(Vec::new).extend(page);
    }

    pub fn render(&self) -> CategoryPage {
        let body = if self.loading {
            CategoryBody::Loading
        } else {
            match &self.listings {
                Some(listings) if !listings.is_empty() => CategoryBody::Listings {
                    listings: listings.clone(),
                    next_cursor: self
                        .has_more()
                        .then(|| self.cursor.as_ref().map(Cursor::encode))
                        .flatten(),
                },
                // Past the last page of a category that does have listings.
                Some(_) if self.resumed => CategoryBody::Listings {
                    listings: Vec::new(),
                    next_cursor: None,
                },
                _ => CategoryBody::Empty {
                    message: format!("No listings for {}", self.category),
                },
            }
        };

        CategoryPage {
            title: self.title(),
            category: self.category.clone(),
            body,
        }
    }
}
