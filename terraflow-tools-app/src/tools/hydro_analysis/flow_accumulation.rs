/*
This code is part of the Terraflow geospatial analysis library.
License: MIT
*/

use crate::tools::*;
use std::collections::BinaryHeap;
use std::cmp::Ordering;
use std::env;
use std::f64;
use std::io::{Error, ErrorKind};
use std::path;
use std::time::Instant;
use terraflow_common::structures::Array2D;
use terraflow_common::utils::{geodesic_distance, get_formatted_elapsed_time};
use terraflow_raster::*;

/// Null sentinel for the scaled integer elevation grid.
const ALT_NULL: i32 = i32::MIN;

const METER_TO_FOOT: f64 = 1.0 / 0.3048;

/// Neighbour offsets, cardinals first. The contour lengths and distances
/// below are indexed the same way.
const NEXT_DR: [isize; 8] = [1, -1, 0, 0, -1, 1, 1, -1];
const NEXT_DC: [isize; 8] = [0, 0, -1, 1, 1, -1, 1, -1];

/// Offsets of the downstream cell for drainage codes 1..8 (counter-clockwise
/// from NE); index 0 is unused.
const ASP_R: [isize; 9] = [0, -1, -1, -1, 0, 1, 1, 1, 0];
const ASP_C: [isize; 9] = [0, 1, 0, -1, -1, -1, 0, 1, 1];

/// Maps the offset from a cell to its downstream neighbour onto the
/// drainage code: DRAIN[1 - dr][1 - dc] viewed from the downstream side,
/// i.e. DRAIN[(up_r - down_r) + 1][(up_c - down_c) + 1] is the code stored
/// at the upstream cell.
const DRAIN: [[i32; 3]; 3] = [[7, 6, 5], [8, 0, 4], [1, 2, 3]];

/// A frontier cell of the A* flood. Ordering is lexicographic on
/// (elevation ascending, insertion sequence ascending) so that cells of
/// equal elevation leave the heap in the order they were pushed. The
/// breadth-first sweep across plateaus is therefore deterministic.
#[derive(PartialEq, Eq, Debug)]
struct GridCell {
    priority: i32,
    insertion: usize,
    row: isize,
    column: isize,
}

impl PartialOrd for GridCell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GridCell {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then(other.insertion.cmp(&self.insertion))
    }
}

/// Merges a donated accumulation value into a receiving cell. A negative
/// magnitude marks a catchment that is partly off-map; the sign must
/// survive every merge so the flag propagates downstream.
fn merge_accum(valued: &mut f64, value: f64) {
    if value > 0f64 {
        if *valued > 0f64 {
            *valued += value;
        } else {
            *valued -= value;
        }
    } else {
        if *valued < 0f64 {
            *valued += value;
        } else {
            *valued = value - *valued;
        }
    }
}

/// Per-run distances and contour lengths. The eight neighbour distances
/// are pre-multiplied by the elevation scale so slopes computed from the
/// scaled integer elevations come out in z-units per metre.
struct NbrMetrics {
    dist_to_nbr: [f64; 8],
    contour: [f64; 8],
    cell_size: f64,
}

fn nbr_metrics(configs: &RasterConfigs, geographic: bool, ele_scale: i32) -> NbrMetrics {
    let (ew_res, ns_res) = if geographic {
        // average the true metric dimensions over the region
        let mid_lat = (configs.north + configs.south) / 2.0;
        let ew1 = geodesic_distance(configs.west, configs.north, configs.east, configs.north);
        let ew2 = geodesic_distance(configs.west, mid_lat, configs.east, mid_lat);
        let ew3 = geodesic_distance(configs.west, configs.south, configs.east, configs.south);
        let ns1 = geodesic_distance(configs.east, configs.north, configs.east, configs.south);
        let ns2 = geodesic_distance(
            (configs.west + configs.east) / 2.0,
            configs.north,
            (configs.west + configs.east) / 2.0,
            configs.south,
        );
        let ns3 = geodesic_distance(configs.west, configs.north, configs.west, configs.south);
        (
            (ew1 + ew2 + ew3) / (3.0 * configs.columns as f64),
            (ns1 + ns2 + ns3) / (3.0 * configs.rows as f64),
        )
    } else {
        (configs.resolution_x, configs.resolution_y)
    };

    let mut dist_to_nbr = [0f64; 8];
    for ct_dir in 0..8 {
        let dy = NEXT_DR[ct_dir].abs() as f64 * ns_res;
        let dx = NEXT_DC[ct_dir].abs() as f64 * ew_res;
        dist_to_nbr[ct_dir] = if ct_dir < 4 {
            (dx + dy) * ele_scale as f64
        } else {
            (dx * dx + dy * dy).sqrt() * ele_scale as f64
        };
    }

    // contours are sides of an octagon, irregular if ns_res != ew_res
    let mut contour = [0f64; 8];
    contour[0] = ((ew_res / ns_res).atan() / 2.0).tan() * ns_res;
    contour[1] = contour[0];
    contour[2] = ((ns_res / ew_res).atan() / 2.0).tan() * ew_res;
    contour[3] = contour[2];
    let cx = ew_res - contour[0];
    let cy = ns_res - contour[2];
    let diag_contour = (cx * cx + cy * cy).sqrt() / 2.0;
    contour[4] = diag_contour;
    contour[5] = diag_contour;
    contour[6] = diag_contour;
    contour[7] = diag_contour;

    NbrMetrics {
        dist_to_nbr,
        contour,
        cell_size: ew_res * ns_res,
    }
}

fn get_slope_tci(ele: i32, down_ele: i32, dist: f64) -> f64 {
    if down_ele >= ele {
        0.5 / dist
    } else {
        (ele - down_ele) as f64 / dist
    }
}

fn mfd_pow(base: f64, exp: i32) -> f64 {
    let mut result = base;
    for _ in 2..=exp {
        result *= base;
    }
    result
}

/// The owned state of one accumulation run: scaled elevations, per-cell
/// accumulation, drainage directions, the swale flags and the A*
/// processing order that every later pass replays.
pub(crate) struct AccumContext {
    rows: isize,
    columns: isize,
    ele_scale: i32,
    pub alt: Array2D<i32>,
    pub wat: Array2D<f64>,
    pub asp: Array2D<i32>,
    pub swale: Array2D<i8>,
    pub tci: Array2D<f64>,
    in_list: Array2D<i8>,
    worked: Array2D<i8>,
    astar_order: Vec<(isize, isize)>,
    insertion: usize,
    heap: BinaryHeap<GridCell>,
    metrics: NbrMetrics,
    threshold: f64,
    c_fac: i32,
    do_points: usize,
    // RUSLE slope-length state
    er_flag: bool,
    half_res: f64,
    diag: f64,
    ew_res: f64,
    ns_res: f64,
    max_length: f64,
    pub s_l: Array2D<f64>,
    pub r_h: Array2D<i32>,
    pub s_g: Array2D<f64>,
    pub l_s: Array2D<f64>,
    pub num_mfd_drift_cells: usize,
    pub num_astar_divergence_cells: usize,
}

impl AccumContext {
    /// Builds the context from an elevation raster. Float elevations are
    /// scaled by 1000 and rounded so the heap can key on exact integers;
    /// integer inputs are used as-is.
    pub fn new(
        input: &Raster,
        weights: Option<&Raster>,
        threshold: f64,
        c_fac: i32,
        er_flag: bool,
        max_length: f64,
    ) -> Result<AccumContext, Error> {
        let rows = input.configs.rows as isize;
        let columns = input.configs.columns as isize;
        let nodata = input.configs.nodata;
        let ele_scale = if input.configs.data_type.is_float() {
            1000
        } else {
            1
        };

        let mut alt: Array2D<i32> = Array2D::new(rows, columns, ALT_NULL, ALT_NULL)?;
        let mut wat: Array2D<f64> = Array2D::new(rows, columns, 0f64, nodata)?;
        let asp: Array2D<i32> = Array2D::new(rows, columns, 0, 0)?;
        let swale: Array2D<i8> = Array2D::new(rows, columns, 0, 0)?;
        let tci: Array2D<f64> = Array2D::new(rows, columns, nodata, nodata)?;
        let mut in_list: Array2D<i8> = Array2D::new(rows, columns, 0, 0)?;
        let mut worked: Array2D<i8> = Array2D::new(rows, columns, 0, 0)?;

        let mut do_points = (rows * columns) as usize;
        for row in 0..rows {
            for col in 0..columns {
                let z = input.get_value(row, col);
                if z == nodata {
                    worked.set_value(row, col, 1);
                    in_list.set_value(row, col, 1);
                    wat.set_value(row, col, nodata);
                    do_points -= 1;
                } else {
                    let scaled = (z * ele_scale as f64).round() as i32;
                    alt.set_value(row, col, scaled);
                    wat.set_value(row, col, 1.0);
                }
            }
        }
        if do_points == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "The input DEM contains no non-null cells.",
            ));
        }

        // seed accumulation from the overland flow raster when given
        if let Some(w) = weights {
            for row in 0..rows {
                for col in 0..columns {
                    if worked.get_value(row, col) == 0 {
                        wat.set_value(row, col, w.get_value(row, col));
                    }
                }
            }
        }

        let half_res = 0.5 * input.configs.resolution_x.min(input.configs.resolution_y);
        let diag = (input.configs.resolution_x * input.configs.resolution_x
            + input.configs.resolution_y * input.configs.resolution_y)
            .sqrt();
        let max_length = if max_length <= 0f64 {
            10.0 * rows as f64 * input.configs.resolution_y
                + 10.0 * columns as f64 * input.configs.resolution_x
        } else {
            max_length
        };

        let mut s_l: Array2D<f64> = Array2D::new(1, 1, 0f64, 0f64)?;
        let mut r_h: Array2D<i32> = Array2D::new(1, 1, 0, 0)?;
        let mut s_g: Array2D<f64> = Array2D::new(1, 1, 0f64, 0f64)?;
        let mut l_s: Array2D<f64> = Array2D::new(1, 1, 0f64, 0f64)?;
        if er_flag {
            s_l = Array2D::new(rows, columns, half_res, nodata)?;
            r_h = alt.duplicate();
            s_g = Array2D::new(rows, columns, nodata, nodata)?;
            l_s = Array2D::new(rows, columns, nodata, nodata)?;
        }

        let metrics = nbr_metrics(
            &input.configs,
            input.is_in_geographic_coordinates(),
            ele_scale,
        );

        Ok(AccumContext {
            rows,
            columns,
            ele_scale,
            alt,
            wat,
            asp,
            swale,
            tci,
            in_list,
            worked,
            astar_order: Vec::with_capacity(do_points),
            insertion: 0,
            heap: BinaryHeap::with_capacity(do_points),
            metrics,
            threshold: if threshold <= 0f64 { 60f64 } else { threshold },
            c_fac,
            do_points,
            er_flag,
            half_res,
            diag,
            ew_res: input.configs.resolution_x,
            ns_res: input.configs.resolution_y,
            max_length,
            s_l,
            r_h,
            s_g,
            l_s,
            num_mfd_drift_cells: 0,
            num_astar_divergence_cells: 0,
        })
    }

    fn add_pt(&mut self, row: isize, col: isize) {
        self.in_list.set_value(row, col, 1);
        self.heap.push(GridCell {
            priority: self.alt.get_value(row, col),
            insertion: self.insertion,
            row,
            column: col,
        });
        self.insertion += 1;
    }

    /// Seeds the flood with every map-edge and null-adjacent cell (plus any
    /// marked depressions), assigning each a forced outward discharge and
    /// flipping its accumulation negative.
    pub fn seed_edges(&mut self, depressions: Option<&Array2D<i8>>) {
        let rows = self.rows;
        let columns = self.columns;
        for row in 0..rows {
            for col in 0..columns {
                if self.worked.get_value(row, col) != 0 {
                    continue;
                }
                let mut asp_value = 0i32;
                if row == 0 {
                    asp_value = -2;
                } else if col == 0 {
                    asp_value = -4;
                } else if row == rows - 1 {
                    asp_value = -6;
                } else if col == columns - 1 {
                    asp_value = -8;
                } else if self.worked.get_value(row - 1, col) != 0 {
                    asp_value = -2;
                } else if self.worked.get_value(row + 1, col) != 0 {
                    asp_value = -6;
                } else if self.worked.get_value(row, col - 1) != 0 {
                    asp_value = -4;
                } else if self.worked.get_value(row, col + 1) != 0 {
                    asp_value = -8;
                } else if self.worked.get_value(row - 1, col - 1) != 0 {
                    asp_value = -3;
                } else if self.worked.get_value(row - 1, col + 1) != 0 {
                    asp_value = -1;
                } else if self.worked.get_value(row + 1, col - 1) != 0 {
                    asp_value = -5;
                } else if self.worked.get_value(row + 1, col + 1) != 0 {
                    asp_value = -7;
                }

                if asp_value != 0 {
                    self.asp.set_value(row, col, asp_value);
                    let w = self.wat.get_value(row, col);
                    if w > 0f64 {
                        self.wat.set_value(row, col, -w);
                    }
                    self.add_pt(row, col);
                } else if let Some(dep) = depressions {
                    // real depression
                    if dep.get_value(row, col) != 0 {
                        self.add_pt(row, col);
                    }
                }
            }
        }
    }

    /// The A* flood: repeatedly pops the lowest seen-but-unworked cell and
    /// discovers its unseen neighbours, recording the pop order. The order
    /// is a topological sort of the drainage graph, downstream before
    /// upstream.
    pub fn astar_flood(&mut self) {
        while let Some(cell) = self.heap.pop() {
            let (r, c) = (cell.row, cell.column);
            self.astar_order.push((r, c));
            self.worked.set_value(r, c, 1);
            for ct_dir in 0..8 {
                let upr = r + NEXT_DR[ct_dir];
                let upc = c + NEXT_DC[ct_dir];
                if upr < 0 || upr >= self.rows || upc < 0 || upc >= self.columns {
                    continue;
                }
                let drain_val = DRAIN[(upr - r + 1) as usize][(upc - c + 1) as usize];
                if self.in_list.get_value(upr, upc) == 0 {
                    self.asp.set_value(upr, upc, drain_val);
                    self.add_pt(upr, upc);
                } else if self.worked.get_value(upr, upc) == 0 {
                    // a forced-edge seed adjacent to this cell drains to it
                    // instead, and this cell's catchment is contaminated
                    if self.asp.get_value(upr, upc) < -1 {
                        self.asp.set_value(upr, upc, drain_val);
                        let w = self.wat.get_value(r, c);
                        if w > 0f64 {
                            self.wat.set_value(r, c, -w);
                        }
                    }
                }
            }
        }
    }

    fn downstream_of(&self, row: isize, col: isize) -> Option<(isize, isize)> {
        let aspect = self.asp.get_value(row, col);
        if aspect == 0 {
            return None;
        }
        let d = aspect.abs() as usize;
        let dr = row + ASP_R[d];
        let dc = col + ASP_C[d];
        if dr >= 0 && dr < self.rows && dc >= 0 && dc < self.columns {
            Some((dr, dc))
        } else {
            None
        }
    }

    /// Single-flow accumulation over the reversed A* order, with stream
    /// tagging and optional TCI and slope-length tracking.
    pub fn accumulate_sfd(&mut self, tci_flag: bool) {
        for killer in (0..self.astar_order.len()).rev() {
            let (r, c) = self.astar_order[killer];
            let aspect = self.asp.get_value(r, c);
            let (dr, dc) = match self.downstream_of(r, c) {
                Some(p) => p,
                None => continue, // user-defined depression
            };

            let value = self.wat.get_value(r, c);
            if value.abs() >= self.threshold {
                self.swale.set_value(r, c, 1);
            }

            // do not distribute flow along edges, this causes artifacts
            let mut edge = false;
            let mut np_side = 8usize;
            let (mut edge_r, mut edge_c) = (r, c);
            for ct_dir in 0..8 {
                let r_nbr = r + NEXT_DR[ct_dir];
                let c_nbr = c + NEXT_DC[ct_dir];
                if dr == r_nbr && dc == c_nbr {
                    np_side = ct_dir;
                }
                if r_nbr < 0 || r_nbr >= self.rows || c_nbr < 0 || c_nbr >= self.columns {
                    edge = true;
                } else if self.alt.get_value(r_nbr, c_nbr) == ALT_NULL {
                    edge = true;
                }
                if edge {
                    edge_r = r_nbr;
                    edge_c = c_nbr;
                    break;
                }
            }
            if edge {
                if self.swale.get_value(r, c) != 0 && aspect > 0 {
                    let flipped =
                        -DRAIN[(r - edge_r + 1) as usize][(c - edge_c + 1) as usize];
                    self.asp.set_value(r, c, flipped);
                }
                continue;
            }

            let mut valued = self.wat.get_value(dr, dc);
            merge_accum(&mut valued, value);
            self.wat.set_value(dr, dc, valued);

            // topographic convergence index ln(a / tan(beta))
            if tci_flag && np_side < 8 {
                let tci_div = self.metrics.contour[np_side]
                    * get_slope_tci(
                        self.alt.get_value(r, c),
                        self.alt.get_value(dr, dc),
                        self.metrics.dist_to_nbr[np_side],
                    );
                self.tci.set_value(
                    r,
                    c,
                    (value.abs() * self.metrics.cell_size / tci_div).ln(),
                );
            }

            let is_swale = self.swale.get_value(r, c) != 0;
            if is_swale || valued.abs() >= self.threshold {
                self.swale.set_value(dr, dc, 1);
            } else if self.er_flag && !is_swale {
                self.slope_length(r, c, dr, dc);
            }
        }
    }

    /// Multi-flow accumulation (Holmgren's modification of Quinn et al.),
    /// honouring the A* path so flow converges into and diverges out of
    /// depressions and obstacles. Followed by a direction adjustment pass
    /// that rewrites each drainage direction toward the neighbour that
    /// actually received the most flow.
    pub fn accumulate_mfd(&mut self, tci_flag: bool) {
        self.worked.reinitialize_values(0);
        let mut workedon = 0usize;

        for killer in (0..self.astar_order.len()).rev() {
            let (r, c) = self.astar_order[killer];
            self.worked.set_value(r, c, 1);
            let (dr, dc) = match self.downstream_of(r, c) {
                Some(p) => p,
                None => continue,
            };

            let value = self.wat.get_value(r, c);
            let ele = self.alt.get_value(r, c);

            // get weights
            let mut weight = [-1f64; 8];
            let mut max_weight = 0f64;
            let mut sum_weight = 0f64;
            let mut np_side = 8usize;
            let mut mfd_cells = 0;
            let mut astar_not_set = true;
            let mut edge = false;
            for ct_dir in 0..8 {
                let r_nbr = r + NEXT_DR[ct_dir];
                let c_nbr = c + NEXT_DC[ct_dir];
                if dr == r_nbr && dc == c_nbr {
                    np_side = ct_dir;
                }
                if r_nbr < 0 || r_nbr >= self.rows || c_nbr < 0 || c_nbr >= self.columns {
                    edge = true;
                    break;
                }
                let ele_nbr = self.alt.get_value(r_nbr, c_nbr);
                if self.worked.get_value(r_nbr, c_nbr) == 0 {
                    if ele_nbr == ALT_NULL {
                        edge = true;
                        break;
                    }
                    if ele_nbr <= ele {
                        weight[ct_dir] = if ele_nbr < ele {
                            mfd_pow(
                                (ele - ele_nbr) as f64 / self.metrics.dist_to_nbr[ct_dir],
                                self.c_fac,
                            )
                        } else {
                            mfd_pow(0.5 / self.metrics.dist_to_nbr[ct_dir], self.c_fac)
                        };
                        sum_weight += weight[ct_dir];
                        mfd_cells += 1;
                        if weight[ct_dir] > max_weight {
                            max_weight = weight[ct_dir];
                        }
                        if dr == r_nbr && dc == c_nbr {
                            astar_not_set = false;
                        }
                    }
                }
            }
            // do not distribute flow along edges, this causes artifacts
            if edge {
                continue;
            }

            // honour the A* path: force it into the set even at zero weight
            if mfd_cells > 0 && astar_not_set && np_side < 8 {
                mfd_cells += 1;
                sum_weight += max_weight;
                weight[np_side] = max_weight;
            }

            let mut tci_div = 0f64;
            let mut sum_contour = 0f64;

            if mfd_cells > 1 {
                let mut prop = 0f64;
                for ct_dir in 0..8 {
                    let r_nbr = r + NEXT_DR[ct_dir];
                    let c_nbr = c + NEXT_DC[ct_dir];
                    if weight[ct_dir] > -0.5 {
                        if self.worked.get_value(r_nbr, c_nbr) == 0 {
                            if tci_flag {
                                sum_contour += self.metrics.contour[ct_dir];
                                tci_div += get_slope_tci(
                                    ele,
                                    self.alt.get_value(r_nbr, c_nbr),
                                    self.metrics.dist_to_nbr[ct_dir],
                                ) * weight[ct_dir];
                            }
                            let w = weight[ct_dir] / sum_weight;
                            prop += w;
                            let mut valued = self.wat.get_value(r_nbr, c_nbr);
                            merge_accum(&mut valued, value * w);
                            self.wat.set_value(r_nbr, c_nbr, valued);
                        } else if ct_dir == np_side {
                            // A* path already processed when distributing
                            workedon += 1;
                        }
                    }
                }
                if (prop - 1.0).abs() > 5E-6 {
                    self.num_mfd_drift_cells += 1;
                }
                if tci_flag {
                    tci_div /= sum_weight;
                }
            }

            if mfd_cells < 2 {
                let mut valued = self.wat.get_value(dr, dc);
                merge_accum(&mut valued, value);
                self.wat.set_value(dr, dc, valued);
                if tci_flag && np_side < 8 {
                    sum_contour = self.metrics.contour[np_side];
                    tci_div = get_slope_tci(
                        ele,
                        self.alt.get_value(dr, dc),
                        self.metrics.dist_to_nbr[np_side],
                    );
                }
            }

            // topographic convergence index ln(a / tan(beta))
            if tci_flag && sum_contour > 0f64 && tci_div > 0f64 {
                self.tci.set_value(
                    r,
                    c,
                    (value.abs() * self.metrics.cell_size / (sum_contour * tci_div)).ln(),
                );
            }
        }
        self.num_astar_divergence_cells = workedon;

        self.adjust_directions();
    }

    /// Rewrites each drainage direction toward the neighbour of maximum
    /// received accumulation, so the stored direction raster is consistent
    /// with the flow map that was actually computed. Streams are started
    /// and continued here as well.
    fn adjust_directions(&mut self) {
        for killer in (0..self.astar_order.len()).rev() {
            let (r, c) = self.astar_order[killer];
            self.worked.set_value(r, c, 0);
            let aspect = self.asp.get_value(r, c);
            let (dr, dc) = match self.downstream_of(r, c) {
                Some(p) => p,
                None => continue,
            };

            let value = self.wat.get_value(r, c);
            let ele = self.alt.get_value(r, c);
            let (mut r_max, mut c_max) = (dr, dc);
            let mut max_val = -1f64;
            let mut stream_cells = 0;
            let mut swale_cells = 0;
            let mut flat = true;
            let mut edge = false;
            let (mut edge_r, mut edge_c) = (r, c);
            for ct_dir in 0..8 {
                let r_nbr = r + NEXT_DR[ct_dir];
                let c_nbr = c + NEXT_DC[ct_dir];
                if r_nbr < 0 || r_nbr >= self.rows || c_nbr < 0 || c_nbr >= self.columns {
                    edge = true;
                    edge_r = r_nbr;
                    edge_c = c_nbr;
                    break;
                }
                if self.swale.get_value(r_nbr, c_nbr) != 0 {
                    swale_cells += 1;
                }
                let valued = self.wat.get_value(r_nbr, c_nbr);
                let ele_nbr = self.alt.get_value(r_nbr, c_nbr);
                if ele_nbr == ALT_NULL {
                    edge = true;
                    edge_r = r_nbr;
                    edge_c = c_nbr;
                    break;
                }
                if valued.abs() + 0.5 >= self.threshold && ele_nbr > ele {
                    stream_cells += 1;
                }
                // the still-set flag marks cells later in the processing
                // order, the same candidate set the distribution pass saw
                if self.worked.get_value(r_nbr, c_nbr) != 0 {
                    if ele_nbr != ele {
                        flat = false;
                    }
                    if valued.abs() > max_val {
                        max_val = valued.abs();
                        r_max = r_nbr;
                        c_max = c_nbr;
                    }
                }
            }
            if edge {
                if self.swale.get_value(r, c) != 0 && aspect > 0 {
                    let flipped =
                        -DRAIN[(r - edge_r + 1) as usize][(c - edge_c + 1) as usize];
                    self.asp.set_value(r, c, flipped);
                }
                continue;
            }

            // update asp
            if dr != r_max || dc != c_max {
                let mut new_aspect =
                    DRAIN[(r - r_max + 1) as usize][(c - c_max + 1) as usize];
                if self.asp.get_value(r, c) < 0 {
                    new_aspect = -new_aspect;
                }
                self.asp.set_value(r, c, new_aspect);
            }

            let mut is_swale = self.swale.get_value(r, c) != 0;
            // start a new stream
            let value_mag = value.abs() + 0.5;
            if !is_swale
                && value_mag >= self.threshold
                && stream_cells < 1
                && swale_cells < 1
                && !flat
            {
                self.swale.set_value(r, c, 1);
                is_swale = true;
            }
            // continue a stream
            if is_swale {
                self.swale.set_value(r_max, c_max, 1);
            } else if self.er_flag {
                self.slope_length(r, c, r_max, c_max);
            }
        }
    }

    /// Tracks the RUSLE slope length downstream of each cell.
    fn slope_length(&mut self, r: isize, c: isize, dr: isize, dc: isize) {
        let res = if r == dr {
            self.ew_res
        } else if c == dc {
            self.ns_res
        } else {
            self.diag
        };

        let mut top_ls = self.s_l.get_value(r, c);
        if top_ls == self.half_res {
            top_ls = res;
        } else {
            top_ls += res;
        }
        self.s_l.set_value(r, c, top_ls);
        let top_alt = self.alt.get_value(r, c);
        let bot_alt = self.alt.get_value(dr, dc);
        if top_alt > bot_alt {
            let bot_ls = self.s_l.get_value(dr, dc);
            if top_ls > bot_ls {
                self.s_l.set_value(dr, dc, top_ls + res);
                self.r_h.set_value(dr, dc, self.r_h.get_value(r, c));
            }
        }
    }

    /// Computes the RUSLE S (slope steepness) and LS (length-slope)
    /// factors from the tracked slope lengths.
    pub fn sg_factor(&mut self) {
        if !self.er_flag {
            return;
        }
        for r in 0..self.rows {
            for c in 0..self.columns {
                let low_elev = self.alt.get_value(r, c);
                if low_elev == ALT_NULL {
                    continue;
                }
                let hih_elev = self.r_h.get_value(r, c);
                let mut length = self.s_l.get_value(r, c);
                let mut height = (hih_elev - low_elev) as f64 / self.ele_scale as f64;
                if length > self.max_length {
                    height *= self.max_length / length;
                    length = self.max_length;
                }
                let sin_theta = height / (height * height + length * length).sqrt();
                let s = if height / length < 0.09 {
                    10.8 * sin_theta + 0.03
                } else {
                    16.8 * sin_theta - 0.50
                };
                self.s_g.set_value(r, c, s);

                // rill to interrill ratio from Steve Warren, undisturbed land
                let mut rill_ratio =
                    (sin_theta / 0.0896) / (3.0 * sin_theta.powf(0.8) + 0.56);
                rill_ratio *= 0.5;
                let s_l_exp = rill_ratio / (1.0 + rill_ratio);
                let l = 100.0 * ((length * METER_TO_FOOT) / 72.6).powf(s_l_exp);
                self.l_s.set_value(r, c, l * s);
            }
        }
    }

    pub fn astar_order(&self) -> &[(isize, isize)] {
        &self.astar_order
    }

    pub fn num_points(&self) -> usize {
        self.do_points
    }
}

/// This tool performs a full watershed-style flow accumulation over a DEM.
/// An A* flood seeded at the map edges visits every cell in order of
/// spill elevation with FIFO tie-break, which yields a drainage direction
/// for every cell (including through depressions and across flats) and a
/// processing order that the accumulation passes replay. Flow is then
/// accumulated either to the single steepest receiver (`--sfd`) or to all
/// downslope neighbours with slope-weighted proportions (the default,
/// with configurable convergence). Accumulation magnitudes carry a sign:
/// cells whose catchment touches the map edge or a null region are
/// negative, marking the value as an underestimate.
///
/// Optional outputs include the drainage-direction raster, a stream
/// raster of cells above the accumulation threshold, the topographic
/// convergence index `ln(a / tan(beta))`, and the RUSLE LS and S factors.
pub struct FlowAccumulation {
    name: String,
    description: String,
    toolbox: String,
    parameters: Vec<ToolParameter>,
    example_usage: String,
}

impl FlowAccumulation {
    pub fn new() -> FlowAccumulation {
        // public constructor
        let name = "FlowAccumulation".to_string();
        let toolbox = "Hydrological Analysis".to_string();
        let description =
            "Calculates flow accumulation from a DEM using an A*-ordered SFD or MFD flood."
                .to_string();

        let mut parameters = vec![];
        parameters.push(ToolParameter {
            name: "Input DEM File".to_owned(),
            flags: vec!["-i".to_owned(), "--dem".to_owned()],
            description: "Input raster DEM file.".to_owned(),
            parameter_type: ParameterType::ExistingFile(ParameterFileType::Raster),
            default_value: None,
            optional: false,
        });

        parameters.push(ToolParameter {
            name: "Output Accumulation File".to_owned(),
            flags: vec!["-o".to_owned(), "--accum".to_owned()],
            description: "Output flow accumulation raster file.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
            default_value: None,
            optional: false,
        });

        parameters.push(ToolParameter {
            name: "Output Drainage Direction File".to_owned(),
            flags: vec!["--drainage".to_owned()],
            description: "Optional output drainage direction raster file.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Output Stream File".to_owned(),
            flags: vec!["--stream".to_owned()],
            description: "Optional output stream network raster file.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Output TCI File".to_owned(),
            flags: vec!["--tci".to_owned()],
            description: "Optional output topographic convergence index raster file.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Output Length-Slope File".to_owned(),
            flags: vec!["--length_slope".to_owned()],
            description: "Optional output RUSLE LS factor raster file.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Output Slope Steepness File".to_owned(),
            flags: vec!["--slope_steepness".to_owned()],
            description: "Optional output RUSLE S factor raster file.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Input Weights File".to_owned(),
            flags: vec!["--flow".to_owned()],
            description: "Optional input raster of per-cell overland flow.".to_owned(),
            parameter_type: ParameterType::ExistingFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Input Depressions File".to_owned(),
            flags: vec!["--depression".to_owned()],
            description: "Optional input raster marking real depressions.".to_owned(),
            parameter_type: ParameterType::ExistingFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Stream Threshold".to_owned(),
            flags: vec!["--threshold".to_owned()],
            description: "Minimum accumulation magnitude for stream cells.".to_owned(),
            parameter_type: ParameterType::Float,
            default_value: Some("60.0".to_owned()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Convergence Factor".to_owned(),
            flags: vec!["--convergence".to_owned()],
            description: "MFD convergence factor (1-10).".to_owned(),
            parameter_type: ParameterType::Integer,
            default_value: Some("5".to_owned()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Maximum Slope Length".to_owned(),
            flags: vec!["--max_slope_length".to_owned()],
            description: "Maximum slope length for the RUSLE factors.".to_owned(),
            parameter_type: ParameterType::Float,
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Use SFD?".to_owned(),
            flags: vec!["-s".to_owned(), "--sfd".to_owned()],
            description: "Use single flow direction instead of MFD.".to_owned(),
            parameter_type: ParameterType::Boolean,
            default_value: Some("false".to_string()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Write absolute magnitudes?".to_owned(),
            flags: vec!["-a".to_owned(), "--abs_accum".to_owned()],
            description: "Write only positive accumulation magnitudes.".to_owned(),
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
            ">>.*{0} -r={1} -v --wd=\"*path*to*data*\" --dem=DEM.asc --accum=accum.asc --threshold=100",
            short_exe, name
        )
        .replace("*", &sep);

        FlowAccumulation {
            name: name,
            description: description,
            toolbox: toolbox,
            parameters: parameters,
            example_usage: usage,
        }
    }
}

impl TerraflowTool for FlowAccumulation {
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
        let mut accum_file = String::new();
        let mut drainage_file = String::new();
        let mut stream_file = String::new();
        let mut tci_file = String::new();
        let mut ls_file = String::new();
        let mut sg_file = String::new();
        let mut flow_file = String::new();
        let mut depression_file = String::new();
        let mut threshold = 0f64;
        let mut c_fac = 5i32;
        let mut max_length = 0f64;
        let mut sfd = false;
        let mut abs_acc = false;

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
            let value = |i: usize| -> String {
                if keyval {
                    vec[1].to_string()
                } else {
                    args[i + 1].to_string()
                }
            };
            if flag_val == "-i" || flag_val == "-input" || flag_val == "-dem" {
                input_file = value(i);
            } else if flag_val == "-o" || flag_val == "-output" || flag_val == "-accum" {
                accum_file = value(i);
            } else if flag_val == "-drainage" {
                drainage_file = value(i);
            } else if flag_val == "-stream" {
                stream_file = value(i);
            } else if flag_val == "-tci" {
                tci_file = value(i);
            } else if flag_val == "-length_slope" {
                ls_file = value(i);
            } else if flag_val == "-slope_steepness" {
                sg_file = value(i);
            } else if flag_val == "-flow" {
                flow_file = value(i);
            } else if flag_val == "-depression" {
                depression_file = value(i);
            } else if flag_val == "-threshold" {
                threshold = value(i)
                    .parse::<f64>()
                    .expect(&format!("Error parsing {}", flag_val));
            } else if flag_val == "-convergence" {
                c_fac = value(i)
                    .parse::<i32>()
                    .expect(&format!("Error parsing {}", flag_val));
            } else if flag_val == "-max_slope_length" {
                max_length = value(i)
                    .parse::<f64>()
                    .expect(&format!("Error parsing {}", flag_val));
            } else if flag_val == "-s" || flag_val == "-sfd" {
                if vec.len() == 1 || !vec[1].to_string().to_lowercase().contains("false") {
                    sfd = true;
                }
            } else if flag_val == "-a" || flag_val == "-abs_accum" {
                if vec.len() == 1 || !vec[1].to_string().to_lowercase().contains("false") {
                    abs_acc = true;
                }
            }
        }

        if !sfd && (c_fac < 1 || c_fac > 10) {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Convergence factor must be between 1 and 10.",
            ));
        }

        let sep: String = path::MAIN_SEPARATOR.to_string();
        let fix_path = |f: &mut String| {
            if !f.is_empty() && !f.contains(&sep) && !f.contains("/") {
                *f = format!("{}{}", working_directory, f);
            }
        };
        fix_path(&mut input_file);
        fix_path(&mut accum_file);
        fix_path(&mut drainage_file);
        fix_path(&mut stream_file);
        fix_path(&mut tci_file);
        fix_path(&mut ls_file);
        fix_path(&mut sg_file);
        fix_path(&mut flow_file);
        fix_path(&mut depression_file);

        if verbose {
            println!("Reading data...")
        };
        let input = Raster::new(&input_file, "r")?;
        let rows = input.configs.rows as isize;
        let columns = input.configs.columns as isize;
        let nodata = input.configs.nodata;

        let weights = if !flow_file.is_empty() {
            Some(Raster::new(&flow_file, "r")?)
        } else {
            None
        };

        let depressions: Option<Array2D<i8>> = if !depression_file.is_empty() {
            let dep = Raster::new(&depression_file, "r")?;
            let mut d: Array2D<i8> = Array2D::new(rows, columns, 0, 0)?;
            for row in 0..rows {
                for col in 0..columns {
                    let v = dep.get_value(row, col);
                    if v != dep.configs.nodata && v != 0f64 {
                        d.set_value(row, col, 1);
                    }
                }
            }
            Some(d)
        } else {
            None
        };

        let start = Instant::now();
        let er_flag = !ls_file.is_empty() || !sg_file.is_empty();
        let tci_flag = !tci_file.is_empty();

        let mut ctx = AccumContext::new(
            &input,
            weights.as_ref(),
            threshold,
            c_fac,
            er_flag,
            max_length,
        )?;

        if verbose {
            println!("Determining offmap flow...");
        }
        ctx.seed_edges(depressions.as_ref());
        if verbose {
            println!("A* Search...");
        }
        ctx.astar_flood();
        if verbose {
            if sfd {
                println!("Accumulating surface flow with SFD...");
            } else {
                println!("Accumulating surface flow with MFD...");
            }
        }
        if sfd {
            ctx.accumulate_sfd(tci_flag);
        } else {
            ctx.accumulate_mfd(tci_flag);
        }
        if er_flag {
            if verbose {
                println!("Length slope determination...");
            }
            ctx.sg_factor();
        }

        if ctx.num_mfd_drift_cells > 0 {
            println!(
                "Warning: MFD proportion of flow distribution drifted from 1.0 at {} cell(s).",
                ctx.num_mfd_drift_cells
            );
        }
        if ctx.num_astar_divergence_cells > 0 {
            println!(
                "Warning: A* path already processed when distributing flow: {} of {} cells.",
                ctx.num_astar_divergence_cells,
                ctx.num_points()
            );
        }

        let elapsed_time = get_formatted_elapsed_time(start);
        if verbose {
            println!("Saving data...")
        };

        let mut output = Raster::initialize_using_file(&accum_file, &input);
        output.configs.data_type = DataType::F64;
        if abs_acc {
            println!("Warning: writing out only positive flow accumulation values.");
            println!("Cells with a likely underestimate can no longer be identified.");
        }
        for row in 0..rows {
            for col in 0..columns {
                let v = ctx.wat.get_value(row, col);
                if v != nodata {
                    output.set_value(row, col, if abs_acc { v.abs() } else { v });
                }
            }
        }
        output.add_metadata_entry(format!(
            "Created by terraflow_tools' {} tool",
            self.get_tool_name()
        ));
        output.add_metadata_entry(format!("Input file: {}", input_file));
        output.add_metadata_entry(format!(
            "Flow routing: {}",
            if sfd { "SFD" } else { "MFD" }
        ));
        output.add_metadata_entry(format!("Elapsed Time (excluding I/O): {}", elapsed_time));
        output.write()?;

        if !drainage_file.is_empty() {
            let mut drainage = Raster::initialize_using_file(&drainage_file, &input);
            drainage.configs.data_type = DataType::I32;
            drainage.configs.photometric_interp = PhotometricInterpretation::Categorical;
            for row in 0..rows {
                for col in 0..columns {
                    if input.get_value(row, col) != nodata {
                        drainage.set_value(row, col, ctx.asp.get_value(row, col) as f64);
                    }
                }
            }
            drainage.write()?;
        }

        if !stream_file.is_empty() {
            let mut stream = Raster::initialize_using_file(&stream_file, &input);
            stream.configs.data_type = DataType::I32;
            stream.configs.photometric_interp = PhotometricInterpretation::Categorical;
            for row in 0..rows {
                for col in 0..columns {
                    if ctx.swale.get_value(row, col) != 0 {
                        stream.set_value(row, col, 1f64);
                    }
                }
            }
            stream.write()?;
        }

        if tci_flag {
            let mut tci_out = Raster::initialize_using_file(&tci_file, &input);
            tci_out.configs.data_type = DataType::F64;
            for row in 0..rows {
                for col in 0..columns {
                    let v = ctx.tci.get_value(row, col);
                    if v != nodata {
                        tci_out.set_value(row, col, v);
                    }
                }
            }
            tci_out.write()?;
        }

        if !ls_file.is_empty() {
            let mut ls_out = Raster::initialize_using_file(&ls_file, &input);
            ls_out.configs.data_type = DataType::F64;
            for row in 0..rows {
                for col in 0..columns {
                    let v = ctx.l_s.get_value(row, col);
                    if v != nodata {
                        ls_out.set_value(row, col, v);
                    }
                }
            }
            ls_out.write()?;
        }

        if !sg_file.is_empty() {
            let mut sg_out = Raster::initialize_using_file(&sg_file, &input);
            sg_out.configs.data_type = DataType::F64;
            for row in 0..rows {
                for col in 0..columns {
                    let v = ctx.s_g.get_value(row, col);
                    if v != nodata {
                        sg_out.set_value(row, col, v);
                    }
                }
            }
            sg_out.write()?;
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

    fn raster_from(vals: &[f64], rows: usize, columns: usize, float_type: bool) -> Raster {
        let configs = RasterConfigs {
            rows,
            columns,
            north: rows as f64,
            south: 0.0,
            east: columns as f64,
            west: 0.0,
            resolution_x: 1.0,
            resolution_y: 1.0,
            nodata: -9999.0,
            data_type: if float_type { DataType::F32 } else { DataType::I32 },
            projection: "planar".to_string(),
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

    fn cone_dem(n: usize) -> Vec<f64> {
        // a cone rising toward the center: flow drains outward everywhere
        let c = (n as f64 - 1.0) / 2.0;
        let mut vals = vec![0f64; n * n];
        for r in 0..n {
            for col in 0..n {
                let d = ((r as f64 - c).powi(2) + (col as f64 - c).powi(2)).sqrt();
                vals[r * n + col] = 100.0 - d * 5.0;
            }
        }
        vals
    }

    #[test]
    fn test_heap_pops_lowest_elevation_fifo() {
        let mut heap = BinaryHeap::new();
        heap.push(GridCell { priority: 5, insertion: 0, row: 0, column: 0 });
        heap.push(GridCell { priority: 3, insertion: 1, row: 1, column: 0 });
        heap.push(GridCell { priority: 3, insertion: 2, row: 2, column: 0 });
        heap.push(GridCell { priority: 4, insertion: 3, row: 3, column: 0 });
        let order: Vec<isize> = std::iter::from_fn(|| heap.pop().map(|c| c.row)).collect();
        // equal elevations leave in insertion order
        assert_eq!(order, vec![1, 2, 3, 0]);
    }

    #[test]
    fn test_drain_matrix_inverts_aspect_offsets() {
        for d in 1..=8usize {
            let (dr, dc) = (ASP_R[d], ASP_C[d]);
            // viewed from the downstream cell, the upstream offset is the
            // negation of the drainage vector
            assert_eq!(DRAIN[(1 - dr) as usize][(1 - dc) as usize], d as i32);
        }
    }

    #[test]
    fn test_merge_accum_sign_rules() {
        let mut v = 2.0;
        merge_accum(&mut v, 3.0);
        assert_eq!(v, 5.0);
        let mut v = -2.0;
        merge_accum(&mut v, 3.0);
        assert_eq!(v, -5.0);
        let mut v = -2.0;
        merge_accum(&mut v, -3.0);
        assert_eq!(v, -5.0);
        let mut v = 2.0;
        merge_accum(&mut v, -3.0);
        assert_eq!(v, -5.0);
    }

    #[test]
    fn test_astar_visits_every_cell_lowest_first_at_start() {
        let input = raster_from(&cone_dem(7), 7, 7, false);
        let mut ctx = AccumContext::new(&input, None, 0.0, 5, false, 0.0).unwrap();
        ctx.seed_edges(None);
        ctx.astar_flood();
        assert_eq!(ctx.astar_order().len(), 49);
        // the first cell popped carries the lowest elevation on the map
        let (r0, c0) = ctx.astar_order()[0];
        let z0 = ctx.alt.get_value(r0, c0);
        for &(r, c) in ctx.astar_order() {
            assert!(ctx.alt.get_value(r, c) >= z0);
        }
        // every non-seed cell received a positive drainage direction
        let (rc, cc) = (3isize, 3isize);
        assert!(ctx.asp.get_value(rc, cc) > 0);
    }

    #[test]
    fn test_sfd_all_cells_at_least_unity_and_edges_negative() {
        let input = raster_from(&cone_dem(7), 7, 7, false);
        let mut ctx = AccumContext::new(&input, None, 1000.0, 5, false, 0.0).unwrap();
        ctx.seed_edges(None);
        ctx.astar_flood();
        ctx.accumulate_sfd(false);
        for row in 0..7 {
            for col in 0..7 {
                let w = ctx.wat.get_value(row, col);
                assert!(w.abs() >= 1.0, "cell ({},{}) = {}", row, col, w);
            }
        }
        // edge cells are flagged as underestimates
        for col in 0..7 {
            assert!(ctx.wat.get_value(0, col) < 0.0);
            assert!(ctx.wat.get_value(6, col) < 0.0);
        }
    }

    #[test]
    fn test_sfd_downstream_magnitude_grows() {
        let input = raster_from(&cone_dem(9), 9, 9, false);
        let mut ctx = AccumContext::new(&input, None, 1000.0, 5, false, 0.0).unwrap();
        ctx.seed_edges(None);
        ctx.astar_flood();
        ctx.accumulate_sfd(false);
        // along each interior drainage link the receiving cell's final
        // magnitude is at least the donor's
        for row in 2..7 {
            for col in 2..7 {
                if let Some((dr, dc)) = ctx.downstream_of(row, col) {
                    if dr >= 1 && dr < 8 && dc >= 1 && dc < 8 {
                        assert!(
                            ctx.wat.get_value(dr, dc).abs() + 1e-9
                                >= ctx.wat.get_value(row, col).abs(),
                            "link ({},{}) -> ({},{})",
                            row,
                            col,
                            dr,
                            dc
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_mfd_proportions_do_not_drift() {
        let input = raster_from(&cone_dem(9), 9, 9, true);
        let mut ctx = AccumContext::new(&input, None, 1000.0, 5, false, 0.0).unwrap();
        ctx.seed_edges(None);
        ctx.astar_flood();
        ctx.accumulate_mfd(false);
        assert_eq!(ctx.num_mfd_drift_cells, 0);
    }

    #[test]
    fn test_mfd_saddle_distributes_to_both_sides() {
        // a saddle: ridge along the center column, dipping toward row 4;
        // cells on the ridgeline split flow down both flanks
        let mut vals = vec![0f64; 81];
        for r in 0..9 {
            for c in 0..9 {
                let flank = (c as f64 - 4.0).abs() * -3.0;
                let along = (r as f64 - 4.0).abs() * 1.0;
                vals[r * 9 + c] = 50.0 + flank + along;
            }
        }
        let input = raster_from(&vals, 9, 9, true);
        let mut ctx = AccumContext::new(&input, None, 1000.0, 5, false, 0.0).unwrap();
        ctx.seed_edges(None);
        ctx.astar_flood();
        ctx.accumulate_mfd(false);
        assert_eq!(ctx.num_mfd_drift_cells, 0);
        // the flanks both receive flow from the ridge
        assert!(ctx.wat.get_value(4, 3).abs() > 1.0);
        assert!(ctx.wat.get_value(4, 5).abs() > 1.0);
    }

    #[test]
    fn test_stream_threshold_marks_swales() {
        let input = raster_from(&cone_dem(9), 9, 9, false);
        let mut ctx = AccumContext::new(&input, None, 2.0, 5, false, 0.0).unwrap();
        ctx.seed_edges(None);
        ctx.astar_flood();
        ctx.accumulate_sfd(false);
        let mut num_swale = 0;
        for row in 0..9 {
            for col in 0..9 {
                if ctx.swale.get_value(row, col) != 0 {
                    num_swale += 1;
                    assert!(ctx.wat.get_value(row, col).abs() >= 2.0);
                }
            }
        }
        assert!(num_swale > 0);
    }

    #[test]
    fn test_tci_defined_on_interior_cells() {
        let input = raster_from(&cone_dem(9), 9, 9, true);
        let mut ctx = AccumContext::new(&input, None, 1000.0, 5, false, 0.0).unwrap();
        ctx.seed_edges(None);
        ctx.astar_flood();
        ctx.accumulate_mfd(true);
        // interior cells away from the edge ring carry a finite TCI
        let mut num_defined = 0;
        for row in 2..7 {
            for col in 2..7 {
                let v = ctx.tci.get_value(row, col);
                if v != ctx.tci.nodata() {
                    assert!(v.is_finite());
                    num_defined += 1;
                }
            }
        }
        assert!(num_defined > 0);
    }
}
