// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Shared fixtures for the integration tests: builds minimal synthetic
//! externally-encoded reference pictures (SPS + PPS + IDR slice) so the
//! tests don't depend on a real encoder binary.

#![allow(dead_code)]

use scroll264::bitstream::{BitReader, BitWriter};
use scroll264::nal::{NalRefIdc, NalUnitType, NalWriter};

/// Picture dimensions used by every concrete end-to-end scenario in the
/// specification: 720x720, 45x45 macroblocks.
pub const SCENARIO_WIDTH: u32 = 720;
pub const SCENARIO_HEIGHT: u32 = 720;

/// Describes the shape of a synthetic externally-encoded reference picture.
pub struct ReferenceSpec {
    pub width: u32,
    pub height: u32,
    pub log2_max_frame_num: u8,
    pub pic_order_cnt_type: u32,
    pub log2_max_pic_order_cnt_lsb: u8,
    pub deblocking_filter_control_present_flag: bool,
}

impl ReferenceSpec {
    pub fn poc_type_2(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            log2_max_frame_num: 4,
            pic_order_cnt_type: 2,
            log2_max_pic_order_cnt_lsb: 0,
            deblocking_filter_control_present_flag: true,
        }
    }

    pub fn poc_type_0(width: u32, height: u32, log2_max_pic_order_cnt_lsb: u8) -> Self {
        Self {
            width,
            height,
            log2_max_frame_num: 4,
            pic_order_cnt_type: 0,
            log2_max_pic_order_cnt_lsb,
            deblocking_filter_control_present_flag: true,
        }
    }
}

/// Emit a baseline-profile SPS RBSP matching [`ReferenceSpec`], in the exact
/// schedule `paramset::parse_sps` expects (no high-profile chroma fields, no
/// `pic_order_cnt_type` 1 branch).
fn emit_external_sps(spec: &ReferenceSpec) -> Vec<u8> {
    let mb_width = spec.width / 16;
    let mb_height = spec.height / 16;

    let mut bw = BitWriter::new();
    bw.write_bits(66, 8); // profile_idc: Baseline
    bw.write_bits(0xc0, 8); // constraint_set flags
    bw.write_bits(40, 8); // level_idc
    bw.write_ue(0); // seq_parameter_set_id
    bw.write_ue((spec.log2_max_frame_num - 4) as u32);
    bw.write_ue(spec.pic_order_cnt_type);
    if spec.pic_order_cnt_type == 0 {
        bw.write_ue((spec.log2_max_pic_order_cnt_lsb - 4) as u32);
    }
    bw.write_ue(4); // max_num_ref_frames
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

fn emit_external_pps(spec: &ReferenceSpec) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_ue(0); // pic_parameter_set_id
    bw.write_ue(0); // seq_parameter_set_id
    bw.write_bit(false); // entropy_coding_mode_flag
    bw.write_bit(false); // bottom_field_pic_order_in_frame_present_flag
    bw.write_ue(0); // num_slice_groups_minus1
    bw.write_ue(1); // num_ref_idx_l0_default_active_minus1
    bw.write_ue(0); // num_ref_idx_l1_default_active_minus1
    bw.write_bit(false); // weighted_pred_flag
    bw.write_bits(0, 2); // weighted_bipred_idc
    bw.write_se(0); // pic_init_qp_minus26
    bw.write_se(0); // pic_init_qs_minus26
    bw.write_se(0); // chroma_qp_index_offset
    bw.write_bit(spec.deblocking_filter_control_present_flag);
    bw.write_bit(false); // constrained_intra_pred_flag
    bw.write_bit(false); // redundant_pic_cnt_present_flag
    bw.write_trailing_bits();
    bw.into_rbsp()
}

/// Emit a synthetic IDR slice RBSP: real header fields, a single
/// stand-in macroblock datum in place of compressed picture data (this
/// crate's rewriter never parses past the header, so the exact payload
/// doesn't matter as long as there's something after it to splice).
fn emit_external_idr_slice(spec: &ReferenceSpec) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_ue(0); // first_mb_in_slice
    bw.write_ue(7); // slice_type: I-all
    bw.write_ue(0); // pic_parameter_set_id
    bw.write_bits(0, spec.log2_max_frame_num); // frame_num
    bw.write_ue(0); // idr_pic_id
    if spec.pic_order_cnt_type == 0 {
        bw.write_bits(0, spec.log2_max_pic_order_cnt_lsb);
    }
    bw.write_bit(false); // no_output_of_prior_pics_flag
    bw.write_bit(false); // long_term_reference_flag
    bw.write_se(0); // slice_qp_delta
    if spec.deblocking_filter_control_present_flag {
        bw.write_ue(0); // disable_deblocking_filter_idc
        bw.write_se(0); // slice_alpha_c0_offset_div2
        bw.write_se(0); // slice_beta_offset_div2
    }
    // Stand-in macroblock layer: a few arbitrary exp-Golomb values so the
    // splice point has real bits to carry.
    bw.write_ue(25);
    bw.write_ue(1);
    bw.write_se(-3);
    bw.write_trailing_bits();
    bw.into_rbsp()
}

/// Build a complete Annex-B byte stream containing one SPS, one PPS and one
/// IDR slice, as the two externally-encoded reference pictures this crate
/// consumes are expected to look.
pub fn build_reference_picture(spec: &ReferenceSpec) -> Vec<u8> {
    let mut writer = NalWriter::new();
    writer.write_unit(
        NalRefIdc::Highest,
        NalUnitType::SequenceParameterSet,
        &emit_external_sps(spec),
    );
    writer.write_unit(
        NalRefIdc::Highest,
        NalUnitType::PictureParameterSet,
        &emit_external_pps(spec),
    );
    writer.write_unit(
        NalRefIdc::Highest,
        NalUnitType::CodedSliceOfAnIdrPicture,
        &emit_external_idr_slice(spec),
    );
    writer.into_bytes()
}

/// One decoded macroblock of a synthesized P-slice: the fields the
/// synthesizer's macroblock layer writes per §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedMb {
    pub skip_run: u32,
    pub ref_idx: u32,
    pub mvd_x: i32,
    pub mvd_y: i32,
}

/// The fields of a synthesized P-slice header this test support cares
/// about, plus the bit position the macroblock layer starts at.
pub struct DecodedPSliceHeader {
    pub frame_num: u32,
    pub num_ref_idx_l0_active_minus1: u32,
    pub ref_list_mod_entries: Vec<u32>,
    pub is_reference: bool,
    pub mmco: Option<(u32, u32)>,
    pub mb_layer_start_bit: usize,
}

/// Parse a synthesized P-slice header, following the exact schedule
/// `synthesizer::ScrollFrameSynthesizer` writes (mirrors
/// `slice_rewriter::parse_idr_slice_header` for the P-slice shape).
pub fn parse_p_slice_header(
    rbsp: &[u8],
    log2_max_frame_num: u8,
    pic_order_cnt_type: u32,
    log2_max_pic_order_cnt_lsb: u8,
    deblocking_filter_control_present_flag: bool,
    is_reference: bool,
) -> DecodedPSliceHeader {
    let mut r = BitReader::new(rbsp);

    r.read_ue(); // first_mb_in_slice
    let slice_type = r.read_ue();
    assert_eq!(slice_type, 0, "synthesized slices must use slice_type P (0)");
    r.read_ue(); // pic_parameter_set_id
    let frame_num = r.read_bits(log2_max_frame_num);

    if pic_order_cnt_type == 0 {
        r.read_bits(log2_max_pic_order_cnt_lsb);
    }

    let override_flag = r.read_bit();
    assert!(override_flag, "num_ref_idx_active_override_flag must be set");
    let num_ref_idx_l0_active_minus1 = r.read_ue();

    let ref_list_mod_flag = r.read_bit();
    assert!(ref_list_mod_flag, "ref_pic_list_modification_flag_l0 must be set");
    let mut ref_list_mod_entries = Vec::new();
    loop {
        let idc = r.read_ue();
        if idc == 3 {
            break;
        }
        assert_eq!(idc, 2, "only long-term modification_idc is used");
        ref_list_mod_entries.push(r.read_ue());
    }

    let mut mmco = None;
    if is_reference {
        let adaptive = r.read_bit();
        if adaptive {
            let op1 = r.read_ue();
            let arg1 = r.read_ue();
            let op2 = r.read_ue();
            let arg2 = r.read_ue();
            assert_eq!(op1, 4);
            assert_eq!(op2, 6);
            assert_eq!(r.read_ue(), 0); // MMCO end
            mmco = Some((arg1, arg2));
        }
    }

    r.read_se(); // slice_qp_delta
    if deblocking_filter_control_present_flag {
        r.read_ue(); // disable_deblocking_filter_idc
    }

    DecodedPSliceHeader {
        frame_num,
        num_ref_idx_l0_active_minus1,
        ref_list_mod_entries,
        is_reference,
        mmco,
        mb_layer_start_bit: r.bit_position(),
    }
}

/// Parse every macroblock of a synthesized P-slice's macroblock layer,
/// given the number of macroblocks and whether exactly two references are
/// active (truncated one-bit `ref_idx` coding) or more (unsigned
/// exp-Golomb).
pub fn parse_macroblock_layer(rbsp: &[u8], start_bit: usize, mb_count: usize, num_refs: u32) -> Vec<DecodedMb> {
    let mut r = BitReader::new(rbsp);
    r.seek_to_bit(start_bit);

    let mut mbs = Vec::with_capacity(mb_count);
    for _ in 0..mb_count {
        let skip_run = r.read_ue();
        let mb_type = r.read_ue();
        assert_eq!(mb_type, 0, "every macroblock must be P_L0_16x16");
        let ref_idx = if num_refs <= 1 {
            0
        } else if num_refs == 2 {
            if r.read_bit() { 0 } else { 1 }
        } else {
            r.read_ue()
        };
        let mvd_x = r.read_se();
        let mvd_y = r.read_se();
        assert_eq!(r.read_ue(), 0, "coded_block_pattern must be zero");
        mbs.push(DecodedMb {
            skip_run,
            ref_idx,
            mvd_x,
            mvd_y,
        });
    }
    mbs
}
