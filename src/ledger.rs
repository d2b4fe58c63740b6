//! Resource ledger.
//!
//! The authoritative record of committed reservations per shared resource.
//! Scheduling runs never plan against the live ledger: they take a
//! read-only [`LedgerView`], add tentative reservations to their own copy,
//! and hand the final set back through [`ResourceLedger::commit`].
//!
//! # Concurrency
//! Each resource has its own mutex-guarded book with a version counter.
//! A commit locks every resource it touches in id order (so two commits can
//! never deadlock), checks that no version moved since the view was taken,
//! and only then swaps the project's reservations. A moved version means
//! another project committed in between; the caller replans.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::error::{CapacityError, LedgerError};
use crate::models::{Reservation, Resource, TimeWindow};

/// Time-ordered reservations on one resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceProfile {
    reservations: Vec<Reservation>,
}

impl ResourceProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reservations sorted by window start.
    pub fn reservations(&self) -> &[Reservation] {
        &self.reservations
    }

    pub fn insert(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .partition_point(|r| r.window.start <= reservation.window.start);
        self.reservations.insert(pos, reservation);
    }

    /// Removes one matching reservation. Returns whether one was found.
    pub fn remove(&mut self, reservation: &Reservation) -> bool {
        match self.reservations.iter().position(|r| r == reservation) {
            Some(pos) => {
                self.reservations.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Drops every reservation matching `pred`, returning how many went.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&Reservation) -> bool) -> usize {
        let before = self.reservations.len();
        self.reservations.retain(|r| !pred(r));
        before - self.reservations.len()
    }

    /// Units reserved at an instant.
    pub fn load_at(&self, instant: DateTime<Utc>) -> u32 {
        self.reservations
            .iter()
            .take_while(|r| r.window.start <= instant)
            .filter(|r| r.window.contains(instant))
            .fold(0u32, |load, r| load.saturating_add(r.quantity))
    }

    /// Highest load at any instant of `window`.
    ///
    /// Load only rises where a reservation starts, so it is enough to check
    /// the window start and every reservation start inside the window.
    pub fn peak_load(&self, window: &TimeWindow) -> u32 {
        if window.is_empty() {
            return 0;
        }
        std::iter::once(window.start)
            .chain(
                self.reservations
                    .iter()
                    .map(|r| r.window.start)
                    .filter(|&s| window.contains(s)),
            )
            .map(|t| self.load_at(t))
            .max()
            .unwrap_or(0)
    }

    /// Earliest start at or after `from` where `quantity` more units fit for
    /// `duration` without exceeding `capacity`.
    ///
    /// Load only drops where a reservation ends, so the candidates are `from`
    /// and every reservation end after it. Returns `None` only when
    /// `quantity` exceeds `capacity` outright.
    pub fn earliest_fit(
        &self,
        quantity: u32,
        capacity: u32,
        from: DateTime<Utc>,
        duration: Duration,
    ) -> Option<DateTime<Utc>> {
        if quantity > capacity {
            return None;
        }
        let mut candidates: Vec<DateTime<Utc>> = self
            .reservations
            .iter()
            .map(|r| r.window.end)
            .filter(|&end| end > from)
            .collect();
        candidates.push(from);
        candidates.sort();
        candidates.dedup();

        candidates.into_iter().find(|&start| {
            let window = TimeWindow::starting_at(start, duration);
            fits(self.peak_load(&window), quantity, capacity)
        })
    }

    /// Checks whether `quantity` fits over `window`, reporting the earliest
    /// retry point when it does not.
    pub fn check(
        &self,
        resource_id: &str,
        capacity: u32,
        quantity: u32,
        window: &TimeWindow,
    ) -> Result<(), CapacityError> {
        let peak = self.peak_load(window);
        if fits(peak, quantity, capacity) {
            return Ok(());
        }
        Err(CapacityError {
            resource_id: resource_id.to_string(),
            requested: quantity,
            available: capacity.saturating_sub(peak),
            retry_at: self.earliest_fit(quantity, capacity, window.start, window.duration()),
        })
    }
}

fn fits(load: u32, quantity: u32, capacity: u32) -> bool {
    load.checked_add(quantity).is_some_and(|total| total <= capacity)
}

#[derive(Debug)]
struct ResourceBook {
    capacity: u32,
    version: u64,
    profile: ResourceProfile,
}

/// Snapshot of one resource inside a [`LedgerView`].
#[derive(Debug, Clone, PartialEq)]
pub struct ViewEntry {
    pub capacity: u32,
    pub version: u64,
    pub profile: ResourceProfile,
}

/// Read-only, what-if copy of the ledger.
///
/// Tentative reservations added during a run live only in the view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerView {
    entries: BTreeMap<String, ViewEntry>,
    /// Resources on which the excluded project held reservations.
    held: BTreeSet<String>,
}

impl LedgerView {
    /// A view over fresh resources with no reservations.
    pub fn from_resources(resources: &[Resource]) -> Self {
        let entries = resources
            .iter()
            .map(|r| {
                (
                    r.id.clone(),
                    ViewEntry {
                        capacity: r.capacity,
                        version: 0,
                        profile: ResourceProfile::new(),
                    },
                )
            })
            .collect();
        Self {
            entries,
            held: BTreeSet::new(),
        }
    }

    pub fn capacity(&self, resource_id: &str) -> Option<u32> {
        self.entries.get(resource_id).map(|e| e.capacity)
    }

    pub fn profile(&self, resource_id: &str) -> Option<&ResourceProfile> {
        self.entries.get(resource_id).map(|e| &e.profile)
    }

    pub fn version(&self, resource_id: &str) -> Option<u64> {
        self.entries.get(resource_id).map(|e| e.version)
    }

    pub fn resource_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Units still free at an instant.
    pub fn available_at(&self, resource_id: &str, instant: DateTime<Utc>) -> Option<u32> {
        let entry = self.entries.get(resource_id)?;
        Some(entry.capacity.saturating_sub(entry.profile.load_at(instant)))
    }

    /// Adds a reservation to this view only.
    pub fn reserve_tentative(&mut self, reservation: Reservation) -> Result<(), LedgerError> {
        let entry = self
            .entries
            .get_mut(&reservation.resource_id)
            .ok_or_else(|| LedgerError::UnknownResource(reservation.resource_id.clone()))?;
        entry.profile.check(
            &reservation.resource_id,
            entry.capacity,
            reservation.quantity,
            &reservation.window,
        )?;
        entry.profile.insert(reservation);
        Ok(())
    }
}

/// Shared, thread-safe ledger of committed reservations.
#[derive(Debug, Default)]
pub struct ResourceLedger {
    books: RwLock<BTreeMap<String, Arc<Mutex<ResourceBook>>>>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger with the given resources registered.
    pub fn with_resources(resources: &[Resource]) -> Result<Self, LedgerError> {
        let ledger = Self::new();
        for r in resources {
            ledger.register(r)?;
        }
        Ok(ledger)
    }

    /// Registers a resource, or updates its capacity if already known.
    pub fn register(&self, resource: &Resource) -> Result<(), LedgerError> {
        let mut books = self
            .books
            .write()
            .map_err(|_| LedgerError::Poisoned(resource.id.clone()))?;
        match books.get(&resource.id) {
            Some(book) => {
                let mut book = lock(book, &resource.id)?;
                if book.capacity != resource.capacity {
                    book.capacity = resource.capacity;
                    book.version += 1;
                }
            }
            None => {
                books.insert(
                    resource.id.clone(),
                    Arc::new(Mutex::new(ResourceBook {
                        capacity: resource.capacity,
                        version: 0,
                        profile: ResourceProfile::new(),
                    })),
                );
            }
        }
        Ok(())
    }

    pub fn capacity(&self, resource_id: &str) -> Result<u32, LedgerError> {
        let book = self.book(resource_id)?;
        let book = lock(&book, resource_id)?;
        Ok(book.capacity)
    }

    /// Reserves `reservation.quantity` units over its window, all or nothing.
    ///
    /// On refusal the error carries the earliest start at which the same
    /// request would fit.
    pub fn reserve(&self, reservation: Reservation) -> Result<Reservation, LedgerError> {
        let book = self.book(&reservation.resource_id)?;
        let mut book = lock(&book, &reservation.resource_id)?;
        book.profile.check(
            &reservation.resource_id,
            book.capacity,
            reservation.quantity,
            &reservation.window,
        )?;
        book.profile.insert(reservation.clone());
        book.version += 1;
        Ok(reservation)
    }

    /// Read-only check: would the request fit right now?
    pub fn check(
        &self,
        resource_id: &str,
        quantity: u32,
        window: &TimeWindow,
    ) -> Result<(), LedgerError> {
        let book = self.book(resource_id)?;
        let book = lock(&book, resource_id)?;
        book.profile
            .check(resource_id, book.capacity, quantity, window)
            .map_err(LedgerError::from)
    }

    /// Releases one reservation. Returns whether it was held.
    pub fn release(&self, reservation: &Reservation) -> Result<bool, LedgerError> {
        let book = self.book(&reservation.resource_id)?;
        let mut book = lock(&book, &reservation.resource_id)?;
        let removed = book.profile.remove(reservation);
        if removed {
            book.version += 1;
        }
        Ok(removed)
    }

    /// Releases every reservation held by one task.
    pub fn release_task(&self, project_id: &str, task_id: &str) -> Result<usize, LedgerError> {
        self.release_where(|r| r.project_id == project_id && r.task_id == task_id)
    }

    /// Releases every reservation held by one project.
    pub fn release_project(&self, project_id: &str) -> Result<usize, LedgerError> {
        self.release_where(|r| r.project_id == project_id)
    }

    fn release_where(&self, pred: impl Fn(&Reservation) -> bool) -> Result<usize, LedgerError> {
        let mut total = 0;
        for (id, book) in self.snapshot_books()? {
            let mut book = lock(&book, &id)?;
            let removed = book.profile.remove_where(&pred);
            if removed > 0 {
                book.version += 1;
                total += removed;
            }
        }
        Ok(total)
    }

    /// Units still free at an instant.
    pub fn available_at(
        &self,
        resource_id: &str,
        instant: DateTime<Utc>,
    ) -> Result<u32, LedgerError> {
        let book = self.book(resource_id)?;
        let book = lock(&book, resource_id)?;
        Ok(book.capacity.saturating_sub(book.profile.load_at(instant)))
    }

    /// Committed reservations on one resource, in start order.
    pub fn reservations(&self, resource_id: &str) -> Result<Vec<Reservation>, LedgerError> {
        let book = self.book(resource_id)?;
        let book = lock(&book, resource_id)?;
        Ok(book.profile.reservations().to_vec())
    }

    /// Takes a what-if view. Reservations owned by `exclude_project` are
    /// left out, since a new run for that project replaces them.
    pub fn view(&self, exclude_project: Option<&str>) -> Result<LedgerView, LedgerError> {
        let mut view = LedgerView::default();
        for (id, book) in self.snapshot_books()? {
            let book = lock(&book, &id)?;
            let mut profile = book.profile.clone();
            if let Some(project) = exclude_project {
                if profile.remove_where(|r| r.project_id == project) > 0 {
                    view.held.insert(id.clone());
                }
            }
            view.entries.insert(
                id,
                ViewEntry {
                    capacity: book.capacity,
                    version: book.version,
                    profile,
                },
            );
        }
        Ok(view)
    }

    /// Replaces `project_id`'s reservations with `reservations`, provided
    /// nothing changed on the touched resources since `view` was taken.
    pub fn commit(
        &self,
        project_id: &str,
        view: &LedgerView,
        reservations: Vec<Reservation>,
    ) -> Result<Vec<Reservation>, LedgerError> {
        let mut touched: BTreeSet<String> = view.held.clone();
        touched.extend(reservations.iter().map(|r| r.resource_id.clone()));

        // Collect handles first, then lock in id order.
        let handles: Vec<(String, Arc<Mutex<ResourceBook>>)> = touched
            .iter()
            .map(|id| self.book(id).map(|book| (id.clone(), book)))
            .collect::<Result<_, LedgerError>>()?;
        let mut guards: Vec<(String, MutexGuard<'_, ResourceBook>)> =
            Vec::with_capacity(handles.len());
        for (id, handle) in &handles {
            guards.push((id.clone(), lock(handle, id)?));
        }

        // Compare-and-swap: every touched book must be where the view saw it.
        for (id, book) in &guards {
            if view.version(id) != Some(book.version) {
                return Err(LedgerError::StaleView {
                    resource_id: id.clone(),
                });
            }
        }

        // Build the replacement profiles before touching anything.
        let mut replacements: BTreeMap<String, ResourceProfile> = BTreeMap::new();
        for (id, book) in &guards {
            let mut profile = book.profile.clone();
            profile.remove_where(|r| r.project_id == project_id);
            replacements.insert(id.clone(), profile);
        }
        for reservation in &reservations {
            let (_, book) = guards
                .iter()
                .find(|(id, _)| *id == reservation.resource_id)
                .ok_or_else(|| LedgerError::UnknownResource(reservation.resource_id.clone()))?;
            let profile = replacements
                .get_mut(&reservation.resource_id)
                .ok_or_else(|| LedgerError::UnknownResource(reservation.resource_id.clone()))?;
            profile.check(
                &reservation.resource_id,
                book.capacity,
                reservation.quantity,
                &reservation.window,
            )?;
            profile.insert(reservation.clone());
        }

        for (id, book) in guards.iter_mut() {
            if let Some(profile) = replacements.remove(id.as_str()) {
                if profile != book.profile {
                    book.profile = profile;
                    book.version += 1;
                }
            }
        }

        info!(
            project = project_id,
            reservations = reservations.len(),
            resources = touched.len(),
            "reservations committed"
        );
        Ok(reservations)
    }

    fn book(&self, resource_id: &str) -> Result<Arc<Mutex<ResourceBook>>, LedgerError> {
        let books = self
            .books
            .read()
            .map_err(|_| LedgerError::Poisoned(resource_id.to_string()))?;
        books
            .get(resource_id)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownResource(resource_id.to_string()))
    }

    fn snapshot_books(&self) -> Result<Vec<(String, Arc<Mutex<ResourceBook>>)>, LedgerError> {
        let books = self
            .books
            .read()
            .map_err(|_| LedgerError::Poisoned("*".to_string()))?;
        Ok(books.iter().map(|(k, v)| (k.clone(), Arc::clone(v))).collect())
    }
}

fn lock<'a>(
    book: &'a Mutex<ResourceBook>,
    resource_id: &str,
) -> Result<MutexGuard<'a, ResourceBook>, LedgerError> {
    book.lock().map_err(|_| {
        debug!(resource = resource_id, "ledger lock poisoned");
        LedgerError::Poisoned(resource_id.to_string())
    })
}
