use std::collections::HashSet;

use folio_logging::{folio_debug, folio_error, folio_info, folio_warn};
use serde::{Deserialize, Serialize};

use crate::bus::{BusEvent, EventBus, Subscriber};
use crate::ids::IdGenerator;
use crate::snippet::Snippet;
use crate::storage::BookmarkStorage;

/// Storage key the serialized tree lives under.
pub const BOOKMARKS_KEY: &str = "bookmarks";

/// A root-level folder. Folders hold snippets only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub children: Vec<Snippet>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookmarkNode {
    Folder(Folder),
    Snippet(Snippet),
}

impl BookmarkNode {
    pub fn id(&self) -> &str {
        match self {
            BookmarkNode::Folder(folder) => &folder.id,
            BookmarkNode::Snippet(snippet) => &snippet.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            BookmarkNode::Folder(folder) => &folder.name,
            BookmarkNode::Snippet(snippet) => &snippet.name,
        }
    }

    fn active_snippet_ids(&self) -> Vec<String> {
        match self {
            BookmarkNode::Folder(folder) => folder
                .children
                .iter()
                .filter(|child| child.is_active)
                .map(|child| child.id.clone())
                .collect(),
            BookmarkNode::Snippet(snippet) if snippet.is_active => vec![snippet.id.clone()],
            BookmarkNode::Snippet(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookmarkError {
    #[error("bookmark {0} not found")]
    NotFound(String),
    #[error("name must not be empty")]
    EmptyName,
    #[error("folders cannot be moved into folders")]
    FolderIntoFolder,
    #[error("{0} is not a folder")]
    TargetNotFolder(String),
    #[error("{0} is not a snippet")]
    NotASnippet(String),
    #[error("delete was not confirmed")]
    NotConfirmed,
    #[error("duplicate bookmark id {0}")]
    DuplicateId(String),
    #[error("stored bookmarks are unreadable: {0}")]
    Corrupt(String),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum PersistedNode {
    Folder(PersistedFolder),
    Snippet(Snippet),
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedFolder {
    id: String,
    name: String,
    #[serde(default)]
    children: Vec<PersistedChild>,
}

/// Folder children carry a type tag too; anything but a snippet fails to decode.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum PersistedChild {
    Snippet(Snippet),
}

/// Serializes a tree into the persisted record format.
pub fn encode_tree(tree: &[BookmarkNode]) -> Result<String, BookmarkError> {
    let records: Vec<PersistedNode> = tree
        .iter()
        .map(|node| match node {
            BookmarkNode::Folder(folder) => PersistedNode::Folder(PersistedFolder {
                id: folder.id.clone(),
                name: folder.name.clone(),
                children: folder
                    .children
                    .iter()
                    .cloned()
                    .map(PersistedChild::Snippet)
                    .collect(),
            }),
            BookmarkNode::Snippet(snippet) => PersistedNode::Snippet(snippet.clone()),
        })
        .collect();
    serde_json::to_string(&records).map_err(|err| BookmarkError::Corrupt(err.to_string()))
}

/// Parses the persisted record format, rejecting nested folders and repeated ids.
pub fn decode_tree(serialized: &str) -> Result<Vec<BookmarkNode>, BookmarkError> {
    let records: Vec<PersistedNode> =
        serde_json::from_str(serialized).map_err(|err| BookmarkError::Corrupt(err.to_string()))?;

    let tree: Vec<BookmarkNode> = records
        .into_iter()
        .map(|record| match record {
            PersistedNode::Folder(folder) => BookmarkNode::Folder(Folder {
                id: folder.id,
                name: folder.name,
                children: folder
                    .children
                    .into_iter()
                    .map(|PersistedChild::Snippet(snippet)| snippet)
                    .collect(),
            }),
            PersistedNode::Snippet(snippet) => BookmarkNode::Snippet(snippet),
        })
        .collect();

    let mut seen = HashSet::new();
    for id in all_ids(&tree) {
        if !seen.insert(id) {
            return Err(BookmarkError::DuplicateId(id.to_string()));
        }
    }
    Ok(tree)
}

fn all_ids(tree: &[BookmarkNode]) -> impl Iterator<Item = &str> {
    tree.iter().flat_map(|node| {
        let children: Vec<&str> = match node {
            BookmarkNode::Folder(folder) => folder.children.iter().map(|c| c.id.as_str()).collect(),
            BookmarkNode::Snippet(_) => Vec::new(),
        };
        std::iter::once(node.id()).chain(children)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Root(usize),
    Child { folder: usize, index: usize },
}

/// Owns the persisted two-level tree of folders and snippets.
///
/// Every successful mutation writes the whole tree back to storage. A
/// rejected mutation leaves the tree untouched and writes nothing.
pub struct BookmarkStore<S: BookmarkStorage> {
    tree: Vec<BookmarkNode>,
    storage: S,
    folder_ids: IdGenerator,
}

impl<S: BookmarkStorage> BookmarkStore<S> {
    /// Restores the saved tree, starting empty when storage is missing or unreadable.
    pub fn open(storage: S, folder_ids: IdGenerator) -> Self {
        let tree = match storage.load() {
            Ok(Some(serialized)) => match decode_tree(&serialized) {
                Ok(tree) => {
                    folio_info!("restored {} bookmark entries", tree.len());
                    tree
                }
                Err(err) => {
                    folio_warn!("starting with empty bookmarks: {}", err);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                folio_warn!("starting with empty bookmarks: {}", err);
                Vec::new()
            }
        };
        Self {
            tree,
            storage,
            folder_ids,
        }
    }

    /// Read-only copy of the tree for display.
    pub fn snapshot(&self) -> Vec<BookmarkNode> {
        self.tree.clone()
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        all_ids(&self.tree).any(|existing| existing == id)
    }

    /// Finds a snippet anywhere in the tree, with the id of the folder holding it.
    pub fn find_snippet(&self, id: &str) -> Option<(Option<String>, Snippet)> {
        for node in &self.tree {
            match node {
                BookmarkNode::Snippet(snippet) if snippet.id == id => {
                    return Some((None, snippet.clone()));
                }
                BookmarkNode::Folder(folder) => {
                    if let Some(child) = folder.children.iter().find(|child| child.id == id) {
                        return Some((Some(folder.id.clone()), child.clone()));
                    }
                }
                BookmarkNode::Snippet(_) => {}
            }
        }
        None
    }

    pub fn create_folder(&mut self, name: &str) -> Result<String, BookmarkError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BookmarkError::EmptyName);
        }
        let mut id = self.folder_ids.next_id();
        while self.contains(&id) {
            id = self.folder_ids.next_id();
        }
        self.tree.push(BookmarkNode::Folder(Folder {
            id: id.clone(),
            name: name.to_string(),
            children: Vec::new(),
        }));
        folio_debug!("created folder {} ({:?})", id, name);
        self.persist();
        Ok(id)
    }

    /// Adds a freshly captured snippet, unfiled, at the end of the root.
    pub fn add_snippet(&mut self, snippet: Snippet) -> Result<(), BookmarkError> {
        if self.contains(&snippet.id) {
            return Err(BookmarkError::DuplicateId(snippet.id));
        }
        folio_debug!("bookmarking snippet {}", snippet.id);
        self.tree.push(BookmarkNode::Snippet(snippet));
        self.persist();
        Ok(())
    }

    /// Flips a snippet's active flag and tells the canvas. Returns the new flag.
    pub fn toggle_active(
        &mut self,
        id: &str,
        parent: Option<&str>,
        bus: &mut EventBus,
    ) -> Result<bool, BookmarkError> {
        let location = self.locate(id, parent)?;
        let snippet = match self.node_mut(location) {
            Some(NodeMut::Snippet(snippet)) => snippet,
            Some(NodeMut::Folder(_)) => return Err(BookmarkError::NotASnippet(id.to_string())),
            None => return Err(BookmarkError::NotFound(id.to_string())),
        };
        snippet.is_active = !snippet.is_active;
        let event = if snippet.is_active {
            BusEvent::AddToCanvas {
                snippet: snippet.clone(),
            }
        } else {
            BusEvent::RemoveFromCanvas {
                id: snippet.id.clone(),
            }
        };
        let active = snippet.is_active;
        self.persist();
        bus.emit(event);
        Ok(active)
    }

    /// Renames a folder or snippet. `None` is a cancelled prompt and changes nothing.
    pub fn rename(
        &mut self,
        id: &str,
        parent: Option<&str>,
        new_name: Option<&str>,
    ) -> Result<bool, BookmarkError> {
        let location = self.locate(id, parent)?;
        let Some(new_name) = new_name else {
            return Ok(false);
        };
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(BookmarkError::EmptyName);
        }
        match self.node_mut(location) {
            Some(NodeMut::Folder(folder)) => folder.name = new_name.to_string(),
            Some(NodeMut::Snippet(snippet)) => snippet.name = new_name.to_string(),
            None => return Err(BookmarkError::NotFound(id.to_string())),
        }
        self.persist();
        Ok(true)
    }

    /// Deletes a node (a folder goes with its children). The caller must
    /// have obtained confirmation. Active snippets leave the canvas.
    pub fn delete(
        &mut self,
        id: &str,
        parent: Option<&str>,
        confirmed: bool,
        bus: &mut EventBus,
    ) -> Result<BookmarkNode, BookmarkError> {
        let location = self.locate(id, parent)?;
        if !confirmed {
            return Err(BookmarkError::NotConfirmed);
        }
        let removed = self
            .remove_at(location)
            .ok_or_else(|| BookmarkError::NotFound(id.to_string()))?;
        folio_info!("deleted bookmark {}", removed.id());
        self.persist();
        for id in removed.active_snippet_ids() {
            bus.emit(BusEvent::RemoveFromCanvas { id });
        }
        Ok(removed)
    }

    /// Re-parents a snippet into a root folder. Returns `false` for the
    /// no-op of moving into its current folder.
    pub fn move_to_folder(
        &mut self,
        id: &str,
        from_parent: Option<&str>,
        to_folder: &str,
    ) -> Result<bool, BookmarkError> {
        let location = self.locate(id, from_parent)?;
        if from_parent == Some(to_folder) {
            return Ok(false);
        }
        let target = self.folder_index(to_folder)?;
        let snippet = match self.remove_at(location) {
            Some(BookmarkNode::Snippet(snippet)) => snippet,
            Some(folder) => {
                if let Location::Root(index) = location {
                    self.tree.insert(index, folder);
                }
                return Err(BookmarkError::FolderIntoFolder);
            }
            None => return Err(BookmarkError::NotFound(id.to_string())),
        };
        // Removing a root entry ahead of the target shifts it left by one.
        let target = match location {
            Location::Root(index) if index < target => target - 1,
            _ => target,
        };
        if let BookmarkNode::Folder(folder) = &mut self.tree[target] {
            folder.children.push(snippet);
        }
        self.persist();
        Ok(true)
    }

    /// Moves a snippet out of its folder to the end of the root.
    pub fn move_to_root(&mut self, id: &str, from_folder: &str) -> Result<(), BookmarkError> {
        let location = self.locate(id, Some(from_folder))?;
        let removed = self
            .remove_at(location)
            .ok_or_else(|| BookmarkError::NotFound(id.to_string()))?;
        self.tree.push(removed);
        self.persist();
        Ok(())
    }

    fn folder_index(&self, folder_id: &str) -> Result<usize, BookmarkError> {
        let index = self
            .tree
            .iter()
            .position(|node| node.id() == folder_id)
            .ok_or_else(|| BookmarkError::NotFound(folder_id.to_string()))?;
        match self.tree[index] {
            BookmarkNode::Folder(_) => Ok(index),
            BookmarkNode::Snippet(_) => Err(BookmarkError::TargetNotFolder(folder_id.to_string())),
        }
    }

    fn locate(&self, id: &str, parent: Option<&str>) -> Result<Location, BookmarkError> {
        let not_found = || BookmarkError::NotFound(id.to_string());
        match parent {
            None => self
                .tree
                .iter()
                .position(|node| node.id() == id)
                .map(Location::Root)
                .ok_or_else(not_found),
            Some(parent) => {
                let folder = self.folder_index(parent)?;
                let BookmarkNode::Folder(f) = &self.tree[folder] else {
                    return Err(not_found());
                };
                f.children
                    .iter()
                    .position(|child| child.id == id)
                    .map(|index| Location::Child { folder, index })
                    .ok_or_else(not_found)
            }
        }
    }

    fn node_mut(&mut self, location: Location) -> Option<NodeMut<'_>> {
        match location {
            Location::Root(index) => match self.tree.get_mut(index)? {
                BookmarkNode::Folder(folder) => Some(NodeMut::Folder(folder)),
                BookmarkNode::Snippet(snippet) => Some(NodeMut::Snippet(snippet)),
            },
            Location::Child { folder, index } => match self.tree.get_mut(folder)? {
                BookmarkNode::Folder(f) => f.children.get_mut(index).map(NodeMut::Snippet),
                BookmarkNode::Snippet(_) => None,
            },
        }
    }

    fn remove_at(&mut self, location: Location) -> Option<BookmarkNode> {
        match location {
            Location::Root(index) if index < self.tree.len() => Some(self.tree.remove(index)),
            Location::Root(_) => None,
            Location::Child { folder, index } => match self.tree.get_mut(folder)? {
                BookmarkNode::Folder(f) if index < f.children.len() => {
                    Some(BookmarkNode::Snippet(f.children.remove(index)))
                }
                _ => None,
            },
        }
    }

    fn persist(&mut self) {
        let serialized = match encode_tree(&self.tree) {
            Ok(serialized) => serialized,
            Err(err) => {
                folio_error!("could not serialize bookmarks: {}", err);
                return;
            }
        };
        if let Err(err) = self.storage.save(&serialized) {
            folio_error!("could not save bookmarks: {}", err);
        }
    }
}

enum NodeMut<'a> {
    Folder(&'a mut Folder),
    Snippet(&'a mut Snippet),
}

impl<S: BookmarkStorage> Subscriber for BookmarkStore<S> {
    fn on_event(&mut self, event: &BusEvent, _bus: &mut EventBus) {
        if let BusEvent::SnippetCreated {
            id,
            name,
            data_url,
            page,
        } = event
        {
            let snippet = Snippet {
                id: id.clone(),
                name: name.clone(),
                data_url: data_url.clone(),
                source_page: *page,
                is_active: false,
            };
            if let Err(err) = self.add_snippet(snippet) {
                folio_warn!("snippet not bookmarked: {}", err);
            }
        }
    }
}
