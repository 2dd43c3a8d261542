// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Synthesizes scroll P-frames: at each offset the frame splits into an A
//! region (still showing reference A, shifting toward the top) and a B
//! region (reference B sliding up into view), each coded as P_L0_16x16
//! macroblocks with a motion-vector-only prediction and no residual.

use alloc::vec::Vec;

use crate::bitstream::BitWriter;
use crate::mv_predict::NeighborGrid;
use crate::paramset::ParamSetFacts;
use crate::waypoint::{WaypointTable, MV_LIMIT_PX};
use crate::Error;

/// P slice type (Table 7-6).
const SLICE_TYPE_P: u32 = 0;

/// Reference list indices 0 and 1 are always reference A and reference B.
const REF_IDX_A: u32 = 0;
const REF_IDX_B: u32 = 1;

/// Tracks `frame_num`, wrapping at `1 << log2_max_frame_num` as the H.264
/// decoder's frame_num arithmetic requires.
#[derive(Debug, Default)]
pub struct FrameCounter {
    frame_num: u32,
}

impl FrameCounter {
    pub fn new() -> Self {
        Self { frame_num: 0 }
    }

    /// Continue frame_num numbering from an already-written header, rather
    /// than starting a fresh sequence at 0.
    pub fn starting_at(frame_num: u32) -> Self {
        Self { frame_num }
    }

    pub fn current(&self, facts: &ParamSetFacts) -> u32 {
        let max_frame_num = 1u32 << facts.log2_max_frame_num;
        self.frame_num % max_frame_num
    }

    pub fn advance(&mut self) {
        self.frame_num += 1;
    }
}

/// Synthesizes the scroll P-frame and waypoint P-frame RBSPs for a fixed
/// frame size, tracking the waypoint table and frame_num across calls.
pub struct ScrollFrameSynthesizer {
    facts: ParamSetFacts,
    waypoints: WaypointTable,
    frame_counter: FrameCounter,
}

impl ScrollFrameSynthesizer {
    pub fn new(facts: ParamSetFacts) -> Self {
        Self {
            facts,
            waypoints: WaypointTable::new(),
            frame_counter: FrameCounter::new(),
        }
    }

    pub fn needs_waypoint(&self, offset_px: i32) -> bool {
        self.waypoints.needs_waypoint(offset_px)
    }

    /// Replace the frame_num sequence, e.g. to continue numbering after the
    /// header's reference A/B frames.
    pub fn set_frame_counter(&mut self, counter: FrameCounter) {
        self.frame_counter = counter;
    }

    pub fn waypoint_count(&self) -> usize {
        self.waypoints.len()
    }

    fn num_refs(&self) -> u32 {
        2 + self.waypoints.len() as u32
    }

    fn write_ref_list_modification(&self, bw: &mut BitWriter) {
        bw.write_bit(true); // ref_pic_list_modification_flag_l0
        bw.write_ue(2);
        bw.write_ue(0); // long-term picture number 0 (reference A)
        bw.write_ue(2);
        bw.write_ue(1); // long-term picture number 1 (reference B)
        for w in self.waypoints.iter() {
            bw.write_ue(2);
            bw.write_ue(w.long_term_idx);
        }
        bw.write_ue(3); // modification_of_pic_nums_idc terminator
    }

    fn write_p_slice_header(&self, bw: &mut BitWriter, frame_num: u32, poc_lsb: u32) {
        bw.write_ue(0); // first_mb_in_slice
        bw.write_ue(SLICE_TYPE_P);
        bw.write_ue(0); // pic_parameter_set_id
        bw.write_bits(frame_num, self.facts.log2_max_frame_num);

        if self.facts.pic_order_cnt_type == 0 {
            bw.write_bits(poc_lsb, self.facts.log2_max_pic_order_cnt_lsb);
        }

        bw.write_bit(true); // num_ref_idx_active_override_flag
        bw.write_ue(self.num_refs() - 1);

        self.write_ref_list_modification(bw);

        // Non-reference P-frame: dec_ref_pic_marking is absent.
        bw.write_se(0); // slice_qp_delta
        if self.facts.deblocking_filter_control_present_flag {
            bw.write_ue(1); // disable_deblocking_filter_idc: disabled
        }
    }

    fn write_p_slice_header_waypoint(
        &self,
        bw: &mut BitWriter,
        frame_num: u32,
        poc_lsb: u32,
        is_reference: bool,
        long_term_idx: Option<u32>,
    ) {
        bw.write_ue(0);
        bw.write_ue(SLICE_TYPE_P);
        bw.write_ue(0);
        bw.write_bits(frame_num, self.facts.log2_max_frame_num);

        if self.facts.pic_order_cnt_type == 0 {
            bw.write_bits(poc_lsb, self.facts.log2_max_pic_order_cnt_lsb);
        }

        bw.write_bit(true);
        bw.write_ue(self.num_refs() - 1);

        self.write_ref_list_modification(bw);

        if is_reference {
            match long_term_idx {
                Some(idx) => {
                    bw.write_bit(true); // adaptive_ref_pic_marking_mode_flag
                    bw.write_ue(4); // MMCO 4
                    bw.write_ue(idx + 1);
                    bw.write_ue(6); // MMCO 6
                    bw.write_ue(idx);
                    bw.write_ue(0); // MMCO 0
                }
                None => bw.write_bit(false),
            }
        }

        bw.write_se(0);
        if self.facts.deblocking_filter_control_present_flag {
            bw.write_ue(1);
        }
    }

    fn write_p16x16_mb(&self, bw: &mut BitWriter, ref_idx: u32, mvd_x: i32, mvd_y: i32) {
        bw.write_ue(0); // mb_type: P_L0_16x16
        let num_refs = self.num_refs();
        if num_refs == 1 {
            // ref_idx elided: only one active reference.
        } else if num_refs == 2 {
            bw.write_bit((1 - (ref_idx as i32 & 1)) != 0);
        } else {
            bw.write_ue(ref_idx);
        }
        bw.write_se(mvd_x);
        bw.write_se(mvd_y);
        bw.write_ue(0); // coded_block_pattern: no residual
    }

    /// Write every macroblock's skip run, mb_type and motion vector for a
    /// frame whose per-region reference/offset assignment is already
    /// decided by `region_for_row`. Shared between the plain scroll frame
    /// and the waypoint frame, which differ only in their slice headers and
    /// in whether the B region can itself use a waypoint.
    fn write_macroblock_layer(
        &self,
        bw: &mut BitWriter,
        region_for_row: impl Fn(u32) -> (u32, i32),
    ) {
        let mb_width = self.facts.mb_width() as usize;
        let mb_height = self.facts.mb_height();

        let mut grid = NeighborGrid::new(mb_width);
        let mut skip_count = 0u32;

        for mb_y in 0..mb_height {
            grid.start_row();
            let (ref_idx, mv_y) = region_for_row(mb_y);
            let mv_x_qpel = 0;
            let mv_y_qpel = mv_y * 4;

            for mb_x in 0..mb_width {
                let (pred_mvx, pred_mvy) = grid.predict(mb_x, mb_y as usize, ref_idx);
                let mvd_x = mv_x_qpel - pred_mvx;
                let mvd_y = mv_y_qpel - pred_mvy;

                // P_Skip is never coded; every macroblock carries an
                // explicit skip run of zero ahead of it.
                bw.write_ue(skip_count);
                skip_count = 0;
                self.write_p16x16_mb(bw, ref_idx, mvd_x, mvd_y);

                grid.record(mb_x, mv_x_qpel, mv_y_qpel, ref_idx);
            }
            grid.end_row();
        }

        if skip_count > 0 {
            bw.write_ue(skip_count);
        }
    }

    /// Region assignment shared by both frame kinds: which reference and
    /// motion vector a macroblock row should use, given the row at which
    /// the A/B boundary falls and an optional waypoint substitution for
    /// each side.
    fn region_plan(
        &self,
        offset_px: i32,
        a_waypoint: Option<(u32, i32)>,
        b_waypoint: Option<(u32, i32)>,
    ) -> impl Fn(u32) -> (u32, i32) {
        let height = self.facts.height as i32;
        let a_region_end = ((height - offset_px) / 16) as u32;
        move |mb_y: u32| {
            if mb_y < a_region_end {
                match a_waypoint {
                    Some((idx, wp_offset)) => (idx, offset_px - wp_offset),
                    None => (REF_IDX_A, offset_px),
                }
            } else {
                match b_waypoint {
                    Some((idx, wp_offset)) => (idx, offset_px - wp_offset),
                    None => (REF_IDX_B, offset_px - height),
                }
            }
        }
    }

    /// Synthesize the scroll P-frame RBSP at `offset_px` (0 = full
    /// reference A, height = full reference B).
    pub fn write_scroll_frame(&mut self, offset_px: i32) -> Vec<u8> {
        let frame_num = self.frame_counter.current(&self.facts);

        let mut bw = BitWriter::new();

        let a_waypoint = if offset_px > MV_LIMIT_PX {
            self.waypoints.best_for_a_region(offset_px)
        } else {
            None
        };
        let b_waypoint = self.waypoints.best_for_b_region(offset_px, self.facts.height as i32);

        if self.waypoints.is_empty() {
            self.write_p_slice_header(&mut bw, frame_num, frame_num * 2);
        } else {
            self.write_p_slice_header_waypoint(&mut bw, frame_num, frame_num * 2, false, None);
        }

        let plan = self.region_plan(offset_px, a_waypoint, b_waypoint);
        self.write_macroblock_layer(&mut bw, plan);

        bw.write_trailing_bits();
        self.frame_counter.advance();
        bw.into_rbsp()
    }

    /// Synthesize a waypoint P-frame RBSP at `offset_px`, marking it as a
    /// new long-term reference. Registers the waypoint in the table on
    /// success. Callers must check [`Self::needs_waypoint`] first; this
    /// only errors if the waypoint table is already at capacity.
    pub fn write_waypoint_frame(&mut self, offset_px: i32) -> Result<Vec<u8>, Error> {
        let frame_num = self.frame_counter.current(&self.facts);
        let long_term_idx = self.waypoints.next_long_term_idx();

        let mut bw = BitWriter::new();
        self.write_p_slice_header_waypoint(
            &mut bw,
            frame_num,
            frame_num * 2,
            true,
            Some(long_term_idx),
        );

        let a_waypoint = if offset_px > MV_LIMIT_PX {
            self.waypoints.best_for_a_region(offset_px)
        } else {
            None
        };
        let b_waypoint = self.waypoints.best_for_b_region(offset_px, self.facts.height as i32);
        let plan = self.region_plan(offset_px, a_waypoint, b_waypoint);
        self.write_macroblock_layer(&mut bw, plan);

        bw.write_trailing_bits();
        let rbsp = bw.into_rbsp();

        self.waypoints.insert(offset_px)?;
        self.frame_counter.advance();
        Ok(rbsp)
    }
}
