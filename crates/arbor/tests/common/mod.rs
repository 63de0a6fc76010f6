#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use arbor::core::{Host, Root, RootOptions};
use arbor::dom::Document;

/// A root mounted into the body of a fresh document.
pub fn mount() -> (Rc<RefCell<Document>>, Root) {
    mount_with(RootOptions::default())
}

pub fn mount_with(options: RootOptions) -> (Rc<RefCell<Document>>, Root) {
    let document = Rc::new(RefCell::new(Document::new()));
    let body = document.borrow().body();
    let host: Rc<RefCell<dyn Host>> = document.clone();
    let root = match Root::create(host, body, options) {
        Ok(root) => root,
        Err(error) => panic!("failed to mount: {error}"),
    };
    (document, root)
}

pub fn body_html(document: &RefCell<Document>) -> String {
    let document = document.borrow();
    document.inner_html(document.body())
}

/// Click the element whose `id` attribute is `id`.
pub fn click(document: &RefCell<Document>, id: &str) {
    let node = document
        .borrow()
        .find_by_attr("id", id)
        .unwrap_or_else(|| panic!("no element with id {id}"));
    assert!(arbor::dom::dispatch_event(document, node, "click"));
}
