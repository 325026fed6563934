// Copyright (c) 2025-present, hopscotch-image
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{Bucket, Slot};
use crate::{UserKey, UserValue};

/// Iterator over the entries of a table, in bucket order
pub struct Iter<'a> {
    inner: std::slice::Iter<'a, Bucket>,
}

impl<'a> Iter<'a> {
    pub(crate) fn new(buckets: &'a [Bucket]) -> Self {
        Self {
            inner: buckets.iter(),
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a UserKey, &'a UserValue);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.by_ref().find_map(|bucket| match &bucket.slot {
            Slot::Occupied { key, value } => Some((key, value)),
            Slot::Vacant => None,
        })
    }
}
