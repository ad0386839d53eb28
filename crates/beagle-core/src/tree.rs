//! Folder tree arena.

use indexmap::IndexMap;

use crate::error::TreeError;
use crate::folder::{Folder, FolderId};

/// How many of a folder's largest children a display traversal descends into.
pub const DISPLAY_FAN_OUT: usize = 4;

/// Arena of folders rooted at the scanned path.
///
/// Folders are owned by the arena and reference each other by [`FolderId`].
/// The only mutation is [`insert_folder`](Self::insert_folder), which keeps
/// every ancestor's stats equal to its own files plus all inserted
/// descendants.
#[derive(Debug, Clone)]
pub struct FolderTree {
    root: FolderId,
    folders: IndexMap<FolderId, Folder>,
}

impl FolderTree {
    /// Create a tree from its root folder. Any parent or children on the root are cleared.
    pub fn new(mut root: Folder) -> Self {
        root.parent = None;
        root.children.clear();
        let id = root.id;
        let mut folders = IndexMap::new();
        folders.insert(id, root);
        Self { root: id, folders }
    }

    /// The root folder.
    pub fn root(&self) -> &Folder {
        &self.folders[&self.root]
    }

    /// Id of the root folder.
    pub fn root_id(&self) -> FolderId {
        self.root
    }

    /// Look up a folder by id.
    pub fn get(&self, id: FolderId) -> Option<&Folder> {
        self.folders.get(&id)
    }

    /// Whether a folder with this id has been inserted.
    pub fn contains(&self, id: FolderId) -> bool {
        self.folders.contains_key(&id)
    }

    /// Number of folders including the root.
    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }

    /// Total size of the tree in bytes.
    pub fn total_size(&self) -> u64 {
        self.root().stats.size
    }

    /// Attach `child` under `parent` and propagate its stats to every ancestor.
    ///
    /// The child must not have children of its own yet. Callers are expected
    /// to serialize insertions; this type does no locking.
    pub fn insert_folder(&mut self, parent: FolderId, mut child: Folder) -> Result<(), TreeError> {
        if !self.folders.contains_key(&parent) {
            return Err(TreeError::UnknownParent { parent });
        }
        if self.folders.contains_key(&child.id) {
            return Err(TreeError::DuplicateFolder { id: child.id });
        }

        let id = child.id;
        let delta = child.stats;
        child.parent = Some(parent);
        child.children.clear();
        self.folders.insert(id, child);

        if let Some(parent_folder) = self.folders.get_mut(&parent) {
            parent_folder.children.push(id);
        }

        let mut current = Some(parent);
        while let Some(ancestor_id) = current {
            match self.folders.get_mut(&ancestor_id) {
                Some(ancestor) => {
                    ancestor.stats.absorb(&delta);
                    current = ancestor.parent;
                }
                None => break,
            }
        }

        Ok(())
    }

    /// Children of a folder in insertion order.
    pub fn children(&self, id: FolderId) -> impl Iterator<Item = &Folder> + '_ {
        self.folders
            .get(&id)
            .into_iter()
            .flat_map(|folder| folder.children.iter())
            .filter_map(|child| self.folders.get(child))
    }

    /// Ids from the folder's parent up to the root.
    pub fn ancestors(&self, id: FolderId) -> impl Iterator<Item = FolderId> + '_ {
        let mut current = self.folders.get(&id).and_then(|f| f.parent);
        std::iter::from_fn(move || {
            let id = current?;
            current = self.folders.get(&id).and_then(|f| f.parent);
            Some(id)
        })
    }

    /// Depth below the root (root is 0). `None` for unknown ids.
    pub fn depth_of(&self, id: FolderId) -> Option<usize> {
        self.contains(id).then(|| self.ancestors(id).count())
    }

    /// Every folder except the root, in insertion order.
    pub fn iter_folders(&self) -> impl Iterator<Item = &Folder> + '_ {
        self.folders.values().filter(move |f| f.id != self.root)
    }

    /// Display traversal down to `to_depth`.
    ///
    /// Yields `(folder, depth)` in pre-order, descending only into each
    /// folder's [`DISPLAY_FAN_OUT`] largest children, largest first. Ties keep
    /// insertion order.
    pub fn top_folders(&self, to_depth: usize) -> Vec<(&Folder, usize)> {
        let mut collector = Vec::new();
        self.collect_top(self.root(), 0, to_depth, &mut collector);
        collector
    }

    fn collect_top<'a>(
        &'a self,
        folder: &'a Folder,
        depth: usize,
        to_depth: usize,
        collector: &mut Vec<(&'a Folder, usize)>,
    ) {
        if depth > to_depth {
            return;
        }
        collector.push((folder, depth));

        let mut children: Vec<&Folder> = self.children(folder.id).collect();
        children.sort_by(|a, b| b.stats.size.cmp(&a.stats.size));
        for child in children.into_iter().take(DISPLAY_FAN_OUT) {
            self.collect_top(child, depth + 1, to_depth, collector);
        }
    }
}
