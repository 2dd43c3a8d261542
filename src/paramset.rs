// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Sequence and picture parameter set parsing and emission.
//!
//! Two distinct sets of facts matter here and must never be conflated: the
//! facts describing how the *external* encoder wrote its SPS/PPS (needed to
//! parse its IDR slice header) and the facts this crate uses when writing
//! its own SPS/PPS and P-slice headers. [`ParamSetFacts`] is deliberately
//! unopinionated about which role it plays; callers keep two separate
//! instances.

use alloc::vec::Vec;

use crate::bitstream::{BitReader, BitWriter};
use crate::waypoint::MAX_WAYPOINTS;
use crate::Error;

/// Baseline-profile `profile_idc` value.
const PROFILE_IDC_BASELINE: u32 = 66;

/// Facts about a sequence/picture parameter set pair needed to parse or
/// write a slice header against them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSetFacts {
    pub width: u32,
    pub height: u32,
    pub log2_max_frame_num: u8,
    pub pic_order_cnt_type: u32,
    pub log2_max_pic_order_cnt_lsb: u8,
    pub num_ref_idx_l0_default_minus1: u32,
    pub deblocking_filter_control_present_flag: bool,
}

impl ParamSetFacts {
    /// The facts this crate's own emitted SPS/PPS establish, for a given
    /// frame size and whether the source stream requested deblocking.
    pub fn for_own_output(width: u32, height: u32, deblocking_filter_control_present_flag: bool) -> Self {
        Self {
            width,
            height,
            log2_max_frame_num: 4,
            pic_order_cnt_type: 2,
            log2_max_pic_order_cnt_lsb: 4,
            num_ref_idx_l0_default_minus1: 1,
            deblocking_filter_control_present_flag,
        }
    }

    pub fn mb_width(&self) -> u32 {
        self.width / 16
    }

    pub fn mb_height(&self) -> u32 {
        self.height / 16
    }
}

fn is_high_profile_with_chroma_info(profile_idc: u32) -> bool {
    matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134
    )
}

/// Parse an externally-encoded SPS RBSP, extracting the facts this crate
/// needs to parse that encoder's slice headers. Only Baseline-shaped
/// streams with `pic_order_cnt_type` 0 or 2 and no sequence scaling matrix
/// are supported; these are the only shapes an external hardware or x264
/// Baseline encoder is expected to produce for still reference pictures.
pub fn parse_sps(rbsp: &[u8]) -> Result<(u32, u32, u8, u32, u8), Error> {
    let mut r = BitReader::new(rbsp);

    let profile_idc = r.read_bits(8);
    r.read_bits(8); // constraint_set flags + reserved
    r.read_bits(8); // level_idc
    r.read_ue(); // seq_parameter_set_id

    if is_high_profile_with_chroma_info(profile_idc) {
        let chroma_format_idc = r.read_ue();
        if chroma_format_idc == 3 {
            r.read_bit(); // separate_colour_plane_flag
        }
        r.read_ue(); // bit_depth_luma_minus8
        r.read_ue(); // bit_depth_chroma_minus8
        r.read_bit(); // qpprime_y_zero_transform_bypass_flag
        if r.read_bit() {
            return Err(Error::parse("SPS sequence scaling matrices are not supported"));
        }
    }

    let log2_max_frame_num = (r.read_ue() + 4) as u8;
    let pic_order_cnt_type = r.read_ue();

    let log2_max_pic_order_cnt_lsb = match pic_order_cnt_type {
        0 => (r.read_ue() + 4) as u8,
        1 => {
            return Err(Error::parse("SPS pic_order_cnt_type 1 is not supported"));
        }
        _ => 0,
    };

    r.read_ue(); // max_num_ref_frames
    r.read_bit(); // gaps_in_frame_num_value_allowed_flag

    let pic_width_in_mbs = r.read_ue() + 1;
    let pic_height_in_map_units = r.read_ue() + 1;
    let frame_mbs_only_flag = r.read_bit();

    let mb_height = if frame_mbs_only_flag {
        pic_height_in_map_units
    } else {
        r.read_bit(); // mb_adaptive_frame_field_flag
        pic_height_in_map_units * 2
    };

    let width = pic_width_in_mbs * 16;
    let height = mb_height * 16;

    Ok((
        width,
        height,
        log2_max_frame_num,
        pic_order_cnt_type,
        log2_max_pic_order_cnt_lsb,
    ))
}

/// Parse an externally-encoded PPS RBSP, extracting the two facts needed
/// when rewriting that encoder's slice headers.
pub fn parse_pps(rbsp: &[u8]) -> Result<(u32, bool), Error> {
    let mut r = BitReader::new(rbsp);

    r.read_ue(); // pic_parameter_set_id
    r.read_ue(); // seq_parameter_set_id
    r.read_bit(); // entropy_coding_mode_flag
    r.read_bit(); // bottom_field_pic_order_in_frame_present_flag

    let num_slice_groups_minus1 = r.read_ue();
    if num_slice_groups_minus1 > 0 {
        return Err(Error::parse("PPS slice groups are not supported"));
    }

    let num_ref_idx_l0_default_minus1 = r.read_ue();
    r.read_ue(); // num_ref_idx_l1_default_active_minus1
    r.read_bit(); // weighted_pred_flag
    r.read_bits(2); // weighted_bipred_idc
    r.read_se(); // pic_init_qp_minus26
    r.read_se(); // pic_init_qs_minus26
    r.read_se(); // chroma_qp_index_offset

    let deblocking_filter_control_present_flag = r.read_bit();

    Ok((num_ref_idx_l0_default_minus1, deblocking_filter_control_present_flag))
}

/// Generate a minimal Baseline-profile SPS RBSP for the given frame size.
/// `max_num_ref_frames` accounts for reference A, reference B, and every
/// waypoint long-term reference this stream could ever mint.
pub fn emit_sps(width: u32, height: u32) -> Vec<u8> {
    let mb_width = width / 16;
    let mb_height = height / 16;

    let mut bw = BitWriter::new();
    bw.write_bits(PROFILE_IDC_BASELINE, 8);
    bw.write_bits(0xc0, 8); // constraint_set0/1 flags
    bw.write_bits(40, 8); // level_idc 4.0
    bw.write_ue(0); // seq_parameter_set_id
    bw.write_ue(0); // log2_max_frame_num_minus4 -> 4
    bw.write_ue(2); // pic_order_cnt_type
    bw.write_ue(2 + MAX_WAYPOINTS as u32); // max_num_ref_frames
    bw.write_bit(false); // gaps_in_frame_num_value_allowed_flag
    bw.write_ue(mb_width - 1);
    bw.write_ue(mb_height - 1);
    bw.write_bit(true); // frame_mbs_only_flag
    bw.write_bit(true); // direct_8x8_inference_flag
    bw.write_bit(false); // frame_cropping_flag
    bw.write_bit(false); // vui_parameters_present_flag
    bw.write_trailing_bits();
    bw.into_rbsp()
}

/// Generate a minimal Baseline-profile PPS RBSP, preserving whichever
/// `deblocking_filter_control_present_flag` the source stream used.
pub fn emit_pps(deblocking_filter_control_present_flag: bool) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_ue(0); // pic_parameter_set_id
    bw.write_ue(0); // seq_parameter_set_id
    bw.write_bit(false); // entropy_coding_mode_flag (CAVLC)
    bw.write_bit(false); // bottom_field_pic_order_in_frame_present_flag
    bw.write_ue(0); // num_slice_groups_minus1
    bw.write_ue(1); // num_ref_idx_l0_default_active_minus1 (2 refs)
    bw.write_ue(0); // num_ref_idx_l1_default_active_minus1
    bw.write_bit(false); // weighted_pred_flag
    bw.write_bits(0, 2); // weighted_bipred_idc
    bw.write_se(0); // pic_init_qp_minus26
    bw.write_se(0); // pic_init_qs_minus26
    bw.write_se(0); // chroma_qp_index_offset
    bw.write_bit(deblocking_filter_control_present_flag);
    bw.write_bit(false); // constrained_intra_pred_flag
    bw.write_bit(false); // redundant_pic_cnt_present_flag
    bw.write_trailing_bits();
    bw.into_rbsp()
}
