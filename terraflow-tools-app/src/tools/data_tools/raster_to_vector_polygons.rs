/*
This code is part of the Terraflow geospatial analysis library.
License: MIT
*/

use crate::tools::data_tools::coor_skeleton::{CoorArena, LineKind, Walk};
use crate::tools::*;
use std::env;
use std::f64;
use std::io::{Error, ErrorKind};
use std::path;
use std::time::Instant;
use terraflow_common::structures::Point2D;
use terraflow_common::utils::get_formatted_elapsed_time;
use terraflow_raster::*;
use terraflow_vector::{AttributeField, FieldData, FieldDataType, ShapeType, Shapefile, ShapefileGeometry};

const SNAP_THRESH: f64 = 0.00001;

/// Bookkeeping for one provisional area: its category value and the
/// longest horizontal strip seen so far (the label point site).
#[derive(Clone)]
struct AreaEntry {
    free: bool,
    cat: f64,
    row: isize,
    col: isize,
    width: isize,
}

/// One equivalence-table slot. When two partial areas prove to be the
/// same region, the larger number is mapped onto the smaller, and every
/// member previously mapped onto the larger is re-pointed so only one
/// level of mapping is ever needed.
#[derive(Clone, Default)]
struct EquivEntry {
    mapped: bool,
    target: usize,
    members: Vec<usize>,
}

/// Traces the boundaries of raster regions with a two-row sweep. At every
/// horizontal position the 2x2 window falls into one of twelve
/// topological cases that grow, bend, join, split or close the skeleton
/// of vertical (`v_list`) and horizontal (`h_ptr`) boundary segments
/// under construction.
pub(crate) struct AreaTracer {
    arena: CoorArena,
    v_list: Vec<Option<usize>>,
    h_ptr: Option<usize>,
    row: isize,
    col: isize,
    tl_area: usize,
    area_num: usize,
    a_list: Vec<AreaEntry>,
    e_list: Vec<EquivEntry>,
    bottom: Vec<f64>,
    nodata: f64,
    smooth: bool,
    pub boundaries: Vec<Vec<(f64, f64)>>,
}

/// A label point for one merged region.
pub(crate) struct AreaCentroid {
    pub row: f64,
    pub col: f64,
    pub cat: f64,
}

impl AreaTracer {
    pub fn new(columns: usize, nodata: f64, smooth: bool) -> AreaTracer {
        let mut tracer = AreaTracer {
            arena: CoorArena::default(),
            v_list: vec![None; columns + 2],
            h_ptr: None,
            row: 0,
            col: 0,
            tl_area: 0,
            area_num: 0,
            a_list: vec![],
            e_list: vec![],
            bottom: vec![],
            nodata,
            smooth,
            boundaries: vec![],
        };
        // area 0 represents the outside, the external null values
        tracer.assign_area(nodata);
        tracer
    }

    /// Runs the sweep over the full raster. Rows are padded by one null
    /// cell on every side so that boundaries close against the outside.
    pub fn extract(&mut self, input: &Raster) -> Result<(), Error> {
        let rows = input.configs.rows as isize;
        let columns = input.configs.columns as isize;
        let scan_length = columns as usize + 2;
        let input_nodata = input.configs.nodata;
        let nodata = self.nodata;

        let padded_row = move |r: isize| -> Vec<f64> {
            let mut buf = vec![nodata; scan_length];
            if r >= 0 && r < rows {
                for c in 0..columns {
                    let z = input.get_value(r, c);
                    if z != input_nodata {
                        buf[c as usize + 1] = z;
                    }
                }
            }
            buf
        };

        let mut top = padded_row(-1);
        self.row = 0;
        for r in 0..=rows {
            self.bottom = padded_row(r);
            for col in 0..scan_length - 1 {
                self.col = col as isize;
                let tl = top[col];
                let tr = top[col + 1];
                let bl = self.bottom[col];
                let br = self.bottom[col + 1];
                let case = self.nabors(tl, tr, bl, br);
                self.update_list(case, br);
            }
            if self.h_ptr.is_some() {
                // a loose end: tie it down
                self.end_hline();
            }
            top = std::mem::take(&mut self.bottom);
            self.row += 1;
        }

        if self.arena.live_count() > 0 {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!(
                    "{} boundary point(s) belong to polygons left open at the end of the sweep; \
                     the input raster is corrupt.",
                    self.arena.live_count()
                ),
            ));
        }
        Ok(())
    }

    /// Classifies the 2x2 window into one of the twelve topological cases:
    ///
    /// ```text
    ///  *--*--*   *--*--*   *--*--*   *--*--*
    ///  |  |  |   |     |   |     |   |     |
    ///  *  |  *   *  *--*   *-----*   *--*  *
    ///  |  |  |   |  |  |   |     |   |  |  |
    ///  *--*--*   *--*--*   *--*--*   *--*--*
    ///     0         1         2         3
    ///
    ///  *--*--*   *--*--*   *--*--*   *--*--*
    ///  |  |  |   |  |  |   |  |  |   |     |
    ///  *--*  *   *  *--*   *--*--*   *--*--*
    ///  |     |   |     |   |     |   |  |  |
    ///  *--*--*   *--*--*   *--*--*   *--*--*
    ///     4         5         6         7
    ///
    ///  *--*--*   *--*--*   *--*--*   *--*--*
    ///  |  |  |   |  |  |   |  |  |   |     |
    ///  *--*  *   *  *--*   *--*--*   *     *
    ///  |  |  |   |  |  |   |  |  |   |     |
    ///  *--*--*   *--*--*   *--*--*   *--*--*
    ///     8         9        10        11
    /// ```
    fn nabors(&self, tl: f64, tr: f64, bl: f64, br: f64) -> usize {
        let nd = self.nodata;
        // two nulls are equal; a null never equals a value
        let cmp = |a: f64, b: f64| -> bool {
            let a_null = a == nd;
            let b_null = b == nd;
            (a_null != b_null) || (!a_null && !b_null && a != b)
        };

        if cmp(tl, tr) {
            // 0, 4, 5, 6, 8, 9, 10
            if cmp(tl, bl) {
                // 4, 6, 8, 10
                if cmp(bl, br) {
                    if cmp(tr, br) {
                        10
                    } else {
                        8
                    }
                } else {
                    if cmp(tr, br) {
                        6
                    } else {
                        4
                    }
                }
            } else {
                // 0, 5, 9
                if cmp(bl, br) {
                    if cmp(tr, br) {
                        9
                    } else {
                        0
                    }
                } else {
                    5
                }
            }
        } else {
            // 1, 2, 3, 7, 11
            if cmp(tl, bl) {
                // 2, 3, 7
                if cmp(bl, br) {
                    if cmp(tr, br) {
                        7
                    } else {
                        3
                    }
                } else {
                    2
                }
            } else {
                if cmp(bl, br) {
                    1
                } else {
                    11
                }
            }
        }
    }

    fn update_list(&mut self, case: usize, br: f64) {
        let col = self.col as usize;
        match case {
            0 => {
                // vertical line continues
                self.tl_area = self.arena.get(self.v_list[col].unwrap()).left;
            }
            1 => {
                // bottom right corner: point in the middle of a new line
                let p1 = self.arena.alloc(self.row, self.col); // corner point
                let p2 = self.arena.alloc(self.row, self.col); // downward-growing point
                let p3 = self.arena.alloc(self.row, self.col); // right-growing point
                self.arena.get_mut(p1).bptr = Some(p2);
                self.arena.get_mut(p1).fptr = Some(p3);
                self.arena.get_mut(p2).bptr = Some(p1);
                self.arena.get_mut(p3).bptr = Some(p1);

                let new_area = self.area_num;
                let tl_area = self.tl_area;
                {
                    let p = self.arena.get_mut(p1);
                    p.left = tl_area;
                    p.right = new_area;
                }
                {
                    let p = self.arena.get_mut(p2);
                    p.right = tl_area;
                    p.left = new_area;
                }
                {
                    let p = self.arena.get_mut(p3);
                    p.left = tl_area;
                    p.right = new_area;
                }
                self.assign_area(br);
                self.update_width(new_area, br);
                self.v_list[col] = Some(p2);
                self.h_ptr = Some(p3);
            }
            3 => {
                // bottom left corner: add a point to the line under construction
                let h = self.h_ptr.unwrap();
                self.tl_area = self.arena.get(h).left;
                let new_ptr = self.arena.alloc(self.row, self.col); // downward-growing point
                {
                    let hp = self.arena.get_mut(h);
                    hp.col = self.col;
                    hp.fptr = Some(new_ptr);
                }
                let (left, right) = {
                    let hp = self.arena.get(h);
                    (hp.left, hp.right)
                };
                {
                    let np = self.arena.get_mut(new_ptr);
                    np.bptr = Some(h);
                    np.left = left;
                    np.right = right;
                }
                self.v_list[col] = Some(new_ptr);
                self.h_ptr = None;
            }
            4 => {
                // top left corner: join two lines under construction
                let v = self.v_list[col].unwrap();
                let h = self.h_ptr.unwrap();
                self.tl_area = self.arena.get(v).left;
                let (h_left, h_right) = {
                    let hp = self.arena.get(h);
                    (hp.left, hp.right)
                };
                let (v_left, v_right) = {
                    let vp = self.arena.get(v);
                    (vp.left, vp.right)
                };
                self.equiv_areas(h_left, v_right);
                self.equiv_areas(h_right, v_left);
                let h_pred = self.arena.get(h).bptr.unwrap();
                {
                    let vp = self.arena.get_mut(v);
                    vp.row = self.row; // keep the downward-growing point
                    vp.fptr = Some(h_pred); // and join it to the predecessor
                }
                self.arena.get_mut(h_pred).fptr = Some(v); // of the right-growing point
                self.arena.retire(h); // the right-growing point disappears
                self.h_ptr = None;
                self.write_boundary(v);
                self.v_list[col] = None;
            }
            5 => {
                // top right corner: add a point to the line under construction
                let v = self.v_list[col].unwrap();
                let new_ptr = self.arena.alloc(self.row, self.col); // right-growing point
                self.arena.get_mut(v).row = self.row;
                let (left, right) = {
                    let vp = self.arena.get(v);
                    (vp.left, vp.right)
                };
                {
                    let np = self.arena.get_mut(new_ptr);
                    np.bptr = Some(v);
                    np.left = left;
                    np.right = right;
                }
                self.arena.get_mut(v).fptr = Some(new_ptr);
                self.h_ptr = Some(new_ptr);
                self.v_list[col] = None;
            }
            6 => {
                // T upward: end one vertical and one horizontal line, start
                // a horizontal line
                let v = self.v_list[col].unwrap();
                let h = self.h_ptr.unwrap();
                self.arena.get_mut(v).node = true;
                self.arena.get_mut(h).node = true;
                let left = self.arena.get(v).left;
                let right = self.arena.get(h).right;
                self.end_vline();
                self.end_hline();
                self.start_hline();
                let h = self.h_ptr.unwrap();
                let h_pred = self.arena.get(h).bptr.unwrap();
                self.arena.get_mut(h_pred).node = true; // where we came from is a node
                for idx in [h, h_pred] {
                    let p = self.arena.get_mut(idx);
                    p.left = left;
                    p.right = right;
                }
            }
            7 => {
                // T downward: end the horizontal line, start one vertical
                // and one horizontal line
                let h = self.h_ptr.unwrap();
                self.arena.get_mut(h).node = true;
                let right = self.arena.get(h).right;
                let left = self.arena.get(h).left;
                self.end_hline();
                self.start_hline();
                self.start_vline();
                let h = self.h_ptr.unwrap();
                let v = self.v_list[col].unwrap();
                let h_pred = self.arena.get(h).bptr.unwrap();
                let v_pred = self.arena.get(v).bptr.unwrap();
                self.arena.get_mut(h_pred).node = true;
                self.arena.get_mut(v_pred).node = true;
                let new_area = self.area_num;
                for idx in [h, h_pred] {
                    let p = self.arena.get_mut(idx);
                    p.left = left;
                    p.right = new_area;
                }
                for idx in [v, v_pred] {
                    let p = self.arena.get_mut(idx);
                    p.left = new_area;
                    p.right = right;
                }
                self.assign_area(br);
                self.update_width(new_area, br);
            }
            8 => {
                // T left: end one vertical and one horizontal line, start a
                // vertical line
                let v = self.v_list[col].unwrap();
                let h = self.h_ptr.unwrap();
                self.tl_area = self.arena.get(v).left;
                self.arena.get_mut(h).node = true;
                self.arena.get_mut(v).node = true;
                let right = self.arena.get(h).right;
                let left = self.arena.get(v).left;
                self.end_vline();
                self.end_hline();
                self.start_vline();
                let v = self.v_list[col].unwrap();
                let v_pred = self.arena.get(v).bptr.unwrap();
                self.arena.get_mut(v_pred).node = true; // where we came from is a node
                for idx in [v, v_pred] {
                    let p = self.arena.get_mut(idx);
                    p.left = left;
                    p.right = right;
                }
            }
            9 => {
                // T right: end one vertical line, start one vertical and
                // one horizontal line
                let v = self.v_list[col].unwrap();
                self.arena.get_mut(v).node = true;
                let right = self.arena.get(v).right;
                let left = self.arena.get(v).left;
                self.end_vline();
                self.start_vline();
                self.start_hline();
                let v = self.v_list[col].unwrap();
                let h = self.h_ptr.unwrap();
                let v_pred = self.arena.get(v).bptr.unwrap();
                let h_pred = self.arena.get(h).bptr.unwrap();
                self.arena.get_mut(v_pred).node = true;
                self.arena.get_mut(h_pred).node = true;
                let new_area = self.area_num;
                for idx in [h, h_pred] {
                    let p = self.arena.get_mut(idx);
                    p.left = left;
                    p.right = new_area;
                }
                for idx in [v, v_pred] {
                    let p = self.arena.get_mut(idx);
                    p.left = new_area;
                    p.right = right;
                }
                self.assign_area(br);
                self.update_width(new_area, br);
            }
            10 => {
                // cross: end one vertical and one horizontal line, start
                // one vertical and one horizontal line
                let v = self.v_list[col].unwrap();
                let h = self.h_ptr.unwrap();
                self.arena.get_mut(v).node = true;
                self.arena.get_mut(h).node = true;
                let left = self.arena.get(v).left;
                let right = self.arena.get(h).right;
                self.end_vline();
                self.end_hline();
                self.start_vline();
                self.start_hline();
                let v = self.v_list[col].unwrap();
                let h = self.h_ptr.unwrap();
                let v_pred = self.arena.get(v).bptr.unwrap();
                let h_pred = self.arena.get(h).bptr.unwrap();
                self.arena.get_mut(v_pred).node = true;
                self.arena.get_mut(h_pred).node = true;
                let new_area = self.area_num;
                for idx in [h, h_pred] {
                    let p = self.arena.get_mut(idx);
                    p.left = left;
                    p.right = new_area;
                }
                for idx in [v, v_pred] {
                    let p = self.arena.get_mut(idx);
                    p.left = new_area;
                    p.right = right;
                }
                self.assign_area(br);
                self.update_width(new_area, br);
            }
            _ => {} // cases 2 and 11: nothing to do
        }
    }

    fn end_vline(&mut self) {
        let col = self.col as usize;
        let v = self.v_list[col].unwrap();
        {
            let vp = self.arena.get_mut(v);
            vp.row = self.row;
            vp.fptr = Some(v);
        }
        self.write_boundary(v);
        self.v_list[col] = None;
    }

    fn end_hline(&mut self) {
        let h = self.h_ptr.unwrap();
        {
            let hp = self.arena.get_mut(h);
            hp.col = self.col;
            hp.fptr = Some(h);
        }
        self.write_boundary(h);
        self.h_ptr = None;
    }

    fn start_vline(&mut self) {
        let p1 = self.arena.alloc(self.row, self.col);
        let p2 = self.arena.alloc(self.row, self.col);
        self.arena.get_mut(p1).fptr = Some(p2);
        self.arena.get_mut(p1).bptr = Some(p1);
        self.arena.get_mut(p2).bptr = Some(p1);
        self.v_list[self.col as usize] = Some(p2);
    }

    fn start_hline(&mut self) {
        let p1 = self.arena.alloc(self.row, self.col);
        let p2 = self.arena.alloc(self.row, self.col);
        self.arena.get_mut(p1).bptr = Some(p1);
        self.arena.get_mut(p1).fptr = Some(p2);
        self.arena.get_mut(p2).bptr = Some(p1);
        self.h_ptr = Some(p2);
    }

    /// Attempts to emit a completed boundary; an unfinished line is simply
    /// left for later.
    fn write_boundary(&mut self, seed: usize) {
        let (begin, n) = match self.arena.at_end(seed) {
            Some(walk) => {
                let mut steps = 0;
                let (_, kind) = self.arena.find_end(seed, walk, &mut steps);
                if kind == LineKind::Open {
                    return; // unfinished line
                }
                (seed, steps)
            }
            None => {
                // in the middle of a line
                let mut fwd_steps = 0;
                let (_, kind) = self.arena.find_end(seed, Walk::Forward, &mut fwd_steps);
                match kind {
                    LineKind::Open => return,
                    LineKind::End => {
                        let mut back_steps = 0;
                        let (begin, kind2) =
                            self.arena.find_end(seed, Walk::Backward, &mut back_steps);
                        if kind2 != LineKind::End {
                            return;
                        }
                        (begin.unwrap(), fwd_steps + back_steps)
                    }
                    LineKind::Loop => (seed, fwd_steps),
                }
            }
        };

        let walk = self.arena.at_end(begin).unwrap_or(Walk::Forward);
        let cells = self.arena.collect(begin, walk, n);
        let points = if self.smooth {
            smooth_points(&cells)
        } else {
            cells.iter().map(|&(r, c)| (r as f64, c as f64)).collect()
        };
        self.boundaries.push(points);
    }

    /// Makes the current area number correspond to the passed category.
    fn assign_area(&mut self, cat: f64) {
        self.a_list.push(AreaEntry {
            free: false,
            cat,
            row: 0,
            col: 0,
            width: 0,
        });
        self.e_list.push(EquivEntry::default());
        self.area_num += 1;
    }

    /// Updates the position of the longest horizontal strip in an area.
    fn update_width(&mut self, area: usize, br: f64) {
        let mut w = 0isize;
        let mut j = self.col as usize + 1;
        while j < self.bottom.len() && self.bottom[j] == br {
            j += 1;
            w += 1;
        }

        let mut target = area;
        if target < self.e_list.len() && self.e_list[target].mapped {
            target = self.e_list[target].target;
        }
        if w > self.a_list[target].width {
            self.a_list[target].width = w;
            self.a_list[target].row = self.row;
            self.a_list[target].col = self.col;
        }
    }

    /// Forces two areas to be equivalent, preserving the smallest number
    /// as the representative of the class.
    fn equiv_areas(&mut self, a1: usize, a2: usize) {
        if a1 == a2 {
            return;
        }
        let (small, large) = if a1 < a2 { (a1, a2) } else { (a2, a1) };
        while large >= self.e_list.len() {
            self.e_list.push(EquivEntry::default());
        }

        if self.e_list[large].mapped {
            if self.e_list[small].mapped {
                let large_obj = self.e_list[large].target;
                let small_obj = self.e_list[small].target;
                if large_obj == small_obj {
                    return; // both mapped to the same place
                }
                if small_obj < large_obj {
                    self.map_area(large_obj, small_obj);
                } else {
                    self.map_area(small_obj, large_obj);
                }
            } else {
                let large_obj = self.e_list[large].target;
                if small == large_obj {
                    return; // large already mapped to small
                }
                if small < large_obj {
                    self.map_area(large_obj, small);
                } else {
                    self.map_area(small, large_obj);
                }
            }
        } else {
            if self.e_list[small].mapped {
                let target = self.e_list[small].target;
                self.map_area(large, target);
            } else {
                self.map_area(large, small);
            }
        }
    }

    /// Establishes a mapping from area x onto area y, merging the widest
    /// strip information and re-pointing everything currently mapped onto
    /// x so that only one level of mapping is ever needed.
    fn map_area(&mut self, x: usize, y: usize) {
        self.e_list[x].mapped = true;
        self.e_list[x].target = y;

        if self.a_list[x].width > self.a_list[y].width {
            self.a_list[y].width = self.a_list[x].width;
            self.a_list[y].row = self.a_list[x].row;
            self.a_list[y].col = self.a_list[x].col;
        }

        if self.add_to_list(x, y) {
            let members = self.e_list[x].members.clone();
            for m in members {
                self.e_list[m].target = y;
                self.add_to_list(m, y);
            }
        }
    }

    /// Adds x to y's member list; returns whether an addition was made.
    fn add_to_list(&mut self, x: usize, y: usize) -> bool {
        if self.e_list[y].members.contains(&x) {
            return false;
        }
        self.e_list[y].members.push(x);
        true
    }

    /// Resolves the equivalence classes and produces the label point of
    /// every surviving area. Null-valued areas (including the outside)
    /// carry no label point.
    pub fn centroids(&self, value_flag: bool) -> Vec<AreaCentroid> {
        let mut out = vec![];
        let mut cat_num = 1i32;
        for i in 0..self.area_num {
            let mapped = i < self.e_list.len() && self.e_list[i].mapped;
            let entry = &self.a_list[i];
            if !mapped && !entry.free && entry.width > 0 && entry.cat != self.nodata {
                let cat = if value_flag {
                    entry.cat
                } else {
                    let c = cat_num as f64;
                    cat_num += 1;
                    c
                };
                out.push(AreaCentroid {
                    row: entry.row as f64 + 0.5,
                    col: entry.col as f64 + entry.width as f64 / 2.0,
                    cat,
                });
            }
        }
        out
    }
}

/// Produces the 45-degree chamfered form of a boundary: each move between
/// adjacent skeleton points contributes a point half a cell before and
/// half a cell after the corner, and consecutive duplicates are dropped.
fn smooth_points(cells: &[(isize, isize)]) -> Vec<(f64, f64)> {
    if cells.len() < 2 {
        return cells.iter().map(|&(r, c)| (r as f64, c as f64)).collect();
    }
    let mut pts: Vec<(f64, f64)> = Vec::with_capacity(cells.len() * 2 + 2);
    pts.push((cells[0].0 as f64, cells[0].1 as f64));
    for i in 1..cells.len() {
        let last = cells[i - 1];
        let p = cells[i];
        let idy = p.0 - last.0;
        let idx = p.1 - last.1;
        let dy = if idy > 0 { 0.5 } else if idy < 0 { -0.5 } else { 0.0 };
        let dx = if idx > 0 { 0.5 } else if idx < 0 { -0.5 } else { 0.0 };
        pts.push((last.0 as f64 + dy, last.1 as f64 + dx));
        pts.push((p.0 as f64 - dy, p.1 as f64 - dx));
    }
    let last = cells[cells.len() - 1];
    pts.push((last.0 as f64, last.1 as f64));

    // strip out duplicate consecutive points
    let mut deduped: Vec<(f64, f64)> = Vec::with_capacity(pts.len());
    for p in pts {
        if let Some(last) = deduped.last() {
            if (last.0 - p.0).abs() < SNAP_THRESH && (last.1 - p.1).abs() < SNAP_THRESH {
                continue;
            }
        }
        deduped.push(p);
    }
    deduped
}

/// This tool converts a classified raster into vector form: the boundary
/// lines between 4-connected regions of equal value, and one label point
/// per distinct region carrying its category. The raster is swept once
/// with a 2x2 window; each window position falls into one of twelve
/// topological cases that grow, bend, join or close the boundary
/// skeleton. Partial areas that prove to be the same region are merged
/// through an equivalence table that always keeps the smallest area
/// number as the representative, and each region's label point is placed
/// on its widest horizontal strip. With `--smooth`, corners are chamfered
/// at 45 degrees.
pub struct RasterToVectorPolygons {
    name: String,
    description: String,
    toolbox: String,
    parameters: Vec<ToolParameter>,
    example_usage: String,
}

impl RasterToVectorPolygons {
    pub fn new() -> RasterToVectorPolygons {
        // public constructor
        let name = "RasterToVectorPolygons".to_string();
        let toolbox = "Data Tools".to_string();
        let description =
            "Converts raster regions to vector boundaries and label points.".to_string();

        let mut parameters = vec![];
        parameters.push(ToolParameter {
            name: "Input Raster File".to_owned(),
            flags: vec!["-i".to_owned(), "--input".to_owned()],
            description: "Input raster file.".to_owned(),
            parameter_type: ParameterType::ExistingFile(ParameterFileType::Raster),
            default_value: None,
            optional: false,
        });

        parameters.push(ToolParameter {
            name: "Output Boundary File".to_owned(),
            flags: vec!["-o".to_owned(), "--output".to_owned()],
            description: "Output vector boundary line file.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Vector(
                VectorGeometryType::Polygon,
            )),
            default_value: None,
            optional: false,
        });

        parameters.push(ToolParameter {
            name: "Output Label Points File".to_owned(),
            flags: vec!["--centroids".to_owned()],
            description: "Optional output vector file of area label points.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Vector(
                VectorGeometryType::Point,
            )),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Smooth corners?".to_owned(),
            flags: vec!["-s".to_owned(), "--smooth".to_owned()],
            description: "Smooth corners of the boundaries.".to_owned(),
            parameter_type: ParameterType::Boolean,
            default_value: Some("false".to_string()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Use raster values as categories?".to_owned(),
            flags: vec!["-v".to_owned(), "--value".to_owned()],
            description: "Use raster values as categories instead of a sequence.".to_owned(),
            parameter_type: ParameterType::Boolean,
            default_value: Some("false".to_string()),
            optional: true,
        });

        let sep: String = path::MAIN_SEPARATOR.to_string();
        let e = format!("{}", env::current_exe().unwrap().display());
        let mut parent = env::current_exe().unwrap();
        parent.pop();
        let p = format!("{}", parent.display());
        let mut short_exe = e
            .replace(&p, "")
            .replace(".exe", "")
            .replace(".", "")
            .replace(&sep, "");
        if e.contains(".exe") {
            short_exe += ".exe";
        }
        let usage = format!(
            ">>.*{0} -r={1} -v --wd=\"*path*to*data*\" -i=classes.asc -o=bounds.shp --centroids=labels.shp",
            short_exe, name
        )
        .replace("*", &sep);

        RasterToVectorPolygons {
            name: name,
            description: description,
            toolbox: toolbox,
            parameters: parameters,
            example_usage: usage,
        }
    }
}

impl TerraflowTool for RasterToVectorPolygons {
    fn get_tool_name(&self) -> String {
        self.name.clone()
    }

    fn get_tool_description(&self) -> String {
        self.description.clone()
    }

    fn get_tool_parameters(&self) -> String {
        match serde_json::to_string(&self.parameters) {
            Ok(json_str) => return format!("{{\"parameters\":{}}}", json_str),
            Err(err) => return format!("{:?}", err),
        }
    }

    fn get_example_usage(&self) -> String {
        self.example_usage.clone()
    }

    fn get_toolbox(&self) -> String {
        self.toolbox.clone()
    }

    fn run<'a>(
        &self,
        args: Vec<String>,
        working_directory: &'a str,
        verbose: bool,
    ) -> Result<(), Error> {
        let mut input_file = String::new();
        let mut output_file = String::new();
        let mut centroids_file = String::new();
        let mut smooth = false;
        let mut value_flag = false;

        if args.len() == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Tool run with no parameters.",
            ));
        }
        for i in 0..args.len() {
            let mut arg = args[i].replace("\"", "");
            arg = arg.replace("\'", "");
            let cmd = arg.split("="); // in case an equals sign was used
            let vec = cmd.collect::<Vec<&str>>();
            let mut keyval = false;
            if vec.len() > 1 {
                keyval = true;
            }
            let flag_val = vec[0].to_lowercase().replace("--", "-");
            if flag_val == "-i" || flag_val == "-input" {
                input_file = if keyval {
                    vec[1].to_string()
                } else {
                    args[i + 1].to_string()
                };
            } else if flag_val == "-o" || flag_val == "-output" {
                output_file = if keyval {
                    vec[1].to_string()
                } else {
                    args[i + 1].to_string()
                };
            } else if flag_val == "-centroids" {
                centroids_file = if keyval {
                    vec[1].to_string()
                } else {
                    args[i + 1].to_string()
                };
            } else if flag_val == "-s" || flag_val == "-smooth" {
                if vec.len() == 1 || !vec[1].to_string().to_lowercase().contains("false") {
                    smooth = true;
                }
            } else if flag_val == "-v" || flag_val == "-value" {
                if vec.len() == 1 || !vec[1].to_string().to_lowercase().contains("false") {
                    value_flag = true;
                }
            }
        }

        let sep: String = path::MAIN_SEPARATOR.to_string();
        if !input_file.contains(&sep) && !input_file.contains("/") {
            input_file = format!("{}{}", working_directory, input_file);
        }
        if !output_file.contains(&sep) && !output_file.contains("/") {
            output_file = format!("{}{}", working_directory, output_file);
        }
        if !centroids_file.is_empty() && !centroids_file.contains(&sep) && !centroids_file.contains("/") {
            centroids_file = format!("{}{}", working_directory, centroids_file);
        }

        if verbose {
            println!("Reading data...")
        };
        let input = Raster::new(&input_file, "r")?;
        let columns = input.configs.columns;
        let west = input.configs.west;
        let north = input.configs.north;
        let res_x = input.configs.resolution_x;
        let res_y = input.configs.resolution_y;

        let start = Instant::now();
        if verbose {
            println!("Extracting areas...");
        }
        let mut tracer = AreaTracer::new(columns, input.configs.nodata, smooth);
        tracer.extract(&input)?;

        // boundary points live on cell corners
        let mut vout = Shapefile::new(&output_file, ShapeType::PolyLine)?;
        vout.attributes
            .add_field(&AttributeField::new("FID", FieldDataType::Int, 10u8, 0u8));
        for (i, boundary) in tracer.boundaries.iter().enumerate() {
            let points: Vec<Point2D> = boundary
                .iter()
                .map(|&(r, c)| Point2D::new(west + c * res_x, north - r * res_y))
                .collect();
            if points.len() < 2 {
                continue;
            }
            let mut sfg = ShapefileGeometry::new(ShapeType::PolyLine);
            sfg.add_part(&points);
            vout.add_record(sfg);
            vout.attributes
                .add_record(vec![FieldData::Int(i as i32 + 1)], false);
        }

        let elapsed_time = get_formatted_elapsed_time(start);
        if verbose {
            println!("Saving data...")
        };
        if vout.num_records > 0 {
            vout.write()?;
        } else {
            println!("Warning: the input raster contains no region boundaries.");
        }

        if !centroids_file.is_empty() {
            if verbose {
                println!("Writing areas...");
            }
            let mut cout = Shapefile::new(&centroids_file, ShapeType::Point)?;
            cout.attributes
                .add_field(&AttributeField::new("FID", FieldDataType::Int, 10u8, 0u8));
            cout.attributes
                .add_field(&AttributeField::new("CAT", FieldDataType::Int, 10u8, 0u8));
            cout.attributes.add_field(&AttributeField::new(
                "VALUE",
                FieldDataType::Real,
                12u8,
                4u8,
            ));
            let centroids = tracer.centroids(value_flag);
            for (i, c) in centroids.iter().enumerate() {
                cout.add_point_record(west + c.col * res_x, north - c.row * res_y);
                cout.attributes.add_record(
                    vec![
                        FieldData::Int(i as i32 + 1),
                        FieldData::Int(c.cat as i32),
                        FieldData::Real(c.cat),
                    ],
                    false,
                );
            }
            if cout.num_records > 0 {
                cout.write()?;
            }
        }

        if verbose {
            println!(
                "{}",
                &format!("Elapsed Time (excluding I/O): {}", elapsed_time)
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn raster_from(vals: &[f64], rows: usize, columns: usize) -> Raster {
        let nodata = -9999.0;
        let configs = RasterConfigs {
            rows,
            columns,
            north: rows as f64,
            south: 0.0,
            east: columns as f64,
            west: 0.0,
            resolution_x: 1.0,
            resolution_y: 1.0,
            nodata,
            data_type: DataType::I32,
            ..Default::default()
        };
        let mut r = Raster::initialize_using_config("test.asc", &configs);
        for row in 0..rows {
            for col in 0..columns {
                r.set_value(row as isize, col as isize, vals[row * columns + col]);
            }
        }
        r
    }

    const N: f64 = -9999.0;

    #[test]
    fn test_single_square_produces_one_closed_ring() {
        let vals = [
            N, N, N, //
            N, 1.0, N, //
            N, N, N,
        ];
        let input = raster_from(&vals, 3, 3);
        let mut tracer = AreaTracer::new(3, N, false);
        tracer.extract(&input).unwrap();
        assert_eq!(tracer.boundaries.len(), 1);
        let ring = &tracer.boundaries[0];
        // a closed ring: first and last points coincide
        assert_eq!(ring.first(), ring.last());
        // the four corners of cell (1,1) appear in window coordinates
        for corner in [(1.0, 1.0), (1.0, 2.0), (2.0, 1.0), (2.0, 2.0)] {
            assert!(ring.contains(&corner), "missing corner {:?}", corner);
        }
    }

    #[test]
    fn test_ring_raster_produces_outer_and_hole_boundaries() {
        // the 3x3 ring of 1s with a null hole in the middle
        let vals = [
            1.0, 1.0, 1.0, //
            1.0, N, 1.0, //
            1.0, 1.0, 1.0,
        ];
        let input = raster_from(&vals, 3, 3);
        let mut tracer = AreaTracer::new(3, N, false);
        tracer.extract(&input).unwrap();
        // one outer ring and one hole ring
        assert_eq!(tracer.boundaries.len(), 2);
        let mut lens: Vec<usize> = tracer.boundaries.iter().map(|b| b.len()).collect();
        lens.sort();
        // the hole is a single-cell square (5 points with closure), the
        // outer ring a 3x3 square (also 4 corners plus closure)
        assert_eq!(lens[0], 5);
        assert_eq!(lens[1], 5);

        // exactly one centroid, for the ring area, on the widest row
        let centroids = tracer.centroids(true);
        assert_eq!(centroids.len(), 1);
        assert_eq!(centroids[0].cat, 1.0);
        assert_eq!(centroids[0].row, 0.5); // first row wins the tie
    }

    #[test]
    fn test_smoothed_single_cell_ring_has_chamfered_corners() {
        let vals = [
            N, N, N, //
            N, 7.0, N, //
            N, N, N,
        ];
        let input = raster_from(&vals, 3, 3);
        let mut tracer = AreaTracer::new(3, N, true);
        tracer.extract(&input).unwrap();
        assert_eq!(tracer.boundaries.len(), 1);
        let ring = &tracer.boundaries[0];
        // four corners chamfered into eight distinct points plus closure
        let mut distinct = ring.clone();
        distinct.dedup_by(|a, b| (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9);
        if distinct.first() == distinct.last() {
            distinct.pop();
        }
        assert_eq!(distinct.len(), 8, "ring: {:?}", ring);
    }

    #[test]
    fn test_two_adjacent_regions_share_a_boundary() {
        let vals = [
            1.0, 2.0, //
            1.0, 2.0,
        ];
        let input = raster_from(&vals, 2, 2);
        let mut tracer = AreaTracer::new(2, N, false);
        tracer.extract(&input).unwrap();
        // both regions get a label point
        let centroids = tracer.centroids(true);
        assert_eq!(centroids.len(), 2);
        let mut cats: Vec<f64> = centroids.iter().map(|c| c.cat).collect();
        cats.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(cats, vec![1.0, 2.0]);
    }

    #[test]
    fn test_u_shaped_region_merges_equivalent_areas() {
        // a U shape: the two arms get provisional area numbers that must
        // merge when the bottom row connects them
        let vals = [
            3.0, N, 3.0, //
            3.0, N, 3.0, //
            3.0, 3.0, 3.0,
        ];
        let input = raster_from(&vals, 3, 3);
        let mut tracer = AreaTracer::new(3, N, false);
        tracer.extract(&input).unwrap();
        let centroids = tracer.centroids(true);
        // one region only, despite two provisional areas
        assert_eq!(centroids.len(), 1);
        assert_eq!(centroids[0].cat, 3.0);
        // the label point falls inside the region
        let r = centroids[0].row as usize;
        let c = centroids[0].col as usize;
        assert_eq!(vals[r * 3 + c], 3.0);
    }

    #[test]
    fn test_checkerboard_separates_diagonal_cells() {
        // 4-connectivity: diagonal cells of equal value are separate areas
        let vals = [
            1.0, 2.0, //
            2.0, 1.0,
        ];
        let input = raster_from(&vals, 2, 2);
        let mut tracer = AreaTracer::new(2, N, false);
        tracer.extract(&input).unwrap();
        let centroids = tracer.centroids(false);
        assert_eq!(centroids.len(), 4);
    }
}
