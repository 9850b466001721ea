//! Scripted in-memory sources for exercising the pagination loops.

use crate::api::{ArticleSource, CommentSource};
use crate::error::FetchError;
use crate::interrupt::Interrupt;
use crate::models::{PageBatch, RawArticle, RawComment, SearchPage};
use crate::params::SearchQuery;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

pub fn comment(v: Value) -> RawComment {
    serde_json::from_value(v).unwrap()
}

pub fn ok_batch(comments: Vec<RawComment>) -> PageBatch {
    PageBatch {
        status: "OK".into(),
        total_comments_returned: comments.len() as u64,
        total_comments_found: comments.len() as u64,
        comments,
        ..PageBatch::default()
    }
}

pub fn empty_batch() -> PageBatch {
    ok_batch(Vec::new())
}

pub fn article(id: &str, url: &str) -> RawArticle {
    serde_json::from_value(json!({
        "_id": id,
        "web_url": url,
        "document_type": "article",
        "section_name": "World",
        "new_desk": "Foreign",
        "word_count": 900,
        "print_page": "12",
        "type_of_material": "News",
        "headline": {"main": "Main", "print_headline": format!("Headline {id}")},
        "byline": {"original": "By A Writer"},
        "keywords": [{"name": "subject", "value": "Politics"}],
        "multimedia": [{}, {}],
        "pub_date": "2020-01-01T05:00:00+0000"
    }))
    .unwrap()
}

/// Comment pages scripted per article URL. An exhausted script answers with
/// an empty page.
#[derive(Default)]
pub struct ScriptedComments {
    scripts: RefCell<HashMap<String, VecDeque<Result<PageBatch, FetchError>>>>,
    pub calls: RefCell<Vec<(String, u32)>>,
    /// Fired when the given call number (1-based) is made.
    pub interrupt_on_call: Option<(usize, Interrupt)>,
}

impl ScriptedComments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, url: &str, pages: Vec<Result<PageBatch, FetchError>>) -> Self {
        self.scripts
            .borrow_mut()
            .insert(url.to_string(), pages.into_iter().collect());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl CommentSource for ScriptedComments {
    async fn fetch_page(&self, article_url: &str, offset: u32) -> Result<PageBatch, FetchError> {
        self.calls.borrow_mut().push((article_url.to_string(), offset));
        if let Some((n, interrupt)) = &self.interrupt_on_call {
            if *n == self.call_count() {
                interrupt.trigger();
            }
        }
        self.scripts
            .borrow_mut()
            .get_mut(article_url)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(empty_batch()))
    }
}

/// Search pages scripted in request order. An exhausted script answers with
/// no documents.
#[derive(Default)]
pub struct ScriptedArticles {
    pages: RefCell<VecDeque<Result<SearchPage, FetchError>>>,
    pub requested: RefCell<Vec<i32>>,
}

impl ScriptedArticles {
    pub fn new(pages: Vec<Result<SearchPage, FetchError>>) -> Self {
        Self {
            pages: RefCell::new(pages.into_iter().collect()),
            requested: RefCell::new(Vec::new()),
        }
    }
}

impl ArticleSource for ScriptedArticles {
    async fn search_page(&self, _query: &SearchQuery, page: i32) -> Result<SearchPage, FetchError> {
        self.requested.borrow_mut().push(page);
        self.pages
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(SearchPage::Docs(Vec::new())))
    }
}

/// A source serving both traits, for the full-dataset run.
pub struct Scripted {
    pub articles: ScriptedArticles,
    pub comments: ScriptedComments,
}

impl CommentSource for Scripted {
    async fn fetch_page(&self, article_url: &str, offset: u32) -> Result<PageBatch, FetchError> {
        self.comments.fetch_page(article_url, offset).await
    }
}

impl ArticleSource for Scripted {
    async fn search_page(&self, query: &SearchQuery, page: i32) -> Result<SearchPage, FetchError> {
        self.articles.search_page(query, page).await
    }
}
