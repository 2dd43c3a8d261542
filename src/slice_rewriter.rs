// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Parses an externally-encoded IDR slice header and re-emits it either as
//! a long-term-reference IDR or, via MMCO, as a long-term-reference non-IDR
//! I-frame. The macroblock layer itself is never touched: it is copied bit
//! for bit from the parsed position onward.

use alloc::vec::Vec;

use crate::bitstream::{BitReader, BitWriter};
use crate::paramset::ParamSetFacts;
use crate::Error;

/// Fields read out of an externally-encoded IDR slice header that this
/// crate's rewritten header must reproduce unchanged.
pub struct ParsedSliceHeader {
    pub slice_qp_delta: i32,
    pub disable_deblocking_filter_idc: u32,
    pub slice_alpha_c0_offset_div2: i32,
    pub slice_beta_offset_div2: i32,
    /// Bit offset, from the start of the RBSP, where the macroblock layer
    /// begins.
    pub mb_data_start_bit: usize,
}

/// Parse an externally-encoded IDR slice header's fixed fields, leaving the
/// macroblock layer unexamined. `parse_facts` must describe how the
/// *external* encoder's SPS/PPS were written, not this crate's own.
///
/// Errors with [`Error::Parse`] if the header's fields ran past the end of
/// `rbsp` — a truncated or malformed input whose declared parameter-set
/// facts don't actually match what's there to parse (spec §4.3, §7).
pub fn parse_idr_slice_header(rbsp: &[u8], parse_facts: &ParamSetFacts) -> Result<ParsedSliceHeader, Error> {
    let mut r = BitReader::new(rbsp);

    r.read_ue(); // first_mb_in_slice
    r.read_ue(); // slice_type
    r.read_ue(); // pic_parameter_set_id
    r.read_bits(parse_facts.log2_max_frame_num); // frame_num
    r.read_ue(); // idr_pic_id

    if parse_facts.pic_order_cnt_type == 0 {
        r.read_bits(parse_facts.log2_max_pic_order_cnt_lsb);
    }

    r.read_bit(); // no_output_of_prior_pics_flag
    r.read_bit(); // long_term_reference_flag

    let slice_qp_delta = r.read_se();

    let mut disable_deblocking_filter_idc = 0;
    let mut slice_alpha_c0_offset_div2 = 0;
    let mut slice_beta_offset_div2 = 0;
    if parse_facts.deblocking_filter_control_present_flag {
        disable_deblocking_filter_idc = r.read_ue();
        if disable_deblocking_filter_idc != 1 {
            slice_alpha_c0_offset_div2 = r.read_se();
            slice_beta_offset_div2 = r.read_se();
        }
    }

    if r.overran() {
        return Err(Error::parse("IDR slice header ran past the end of its payload"));
    }

    Ok(ParsedSliceHeader {
        slice_qp_delta,
        disable_deblocking_filter_idc,
        slice_alpha_c0_offset_div2,
        slice_beta_offset_div2,
        mb_data_start_bit: r.bit_position(),
    })
}

fn copy_macroblock_layer(bw: &mut BitWriter, rbsp: &[u8], hdr: &ParsedSliceHeader) -> Result<(), Error> {
    let total_bits = rbsp.len() * 8;
    let mb_data_bits = total_bits
        .checked_sub(hdr.mb_data_start_bit)
        .ok_or_else(|| Error::parse("slice header consumed more bits than its payload contains"))?;
    let mut r = BitReader::new(rbsp);
    r.seek_to_bit(hdr.mb_data_start_bit);
    bw.copy_bits_from(&mut r, mb_data_bits);
    Ok(())
}

fn write_shared_deblocking_fields(bw: &mut BitWriter, write_facts: &ParamSetFacts, hdr: &ParsedSliceHeader) {
    bw.write_se(hdr.slice_qp_delta);
    if write_facts.deblocking_filter_control_present_flag {
        bw.write_ue(hdr.disable_deblocking_filter_idc);
        if hdr.disable_deblocking_filter_idc != 1 {
            bw.write_se(hdr.slice_alpha_c0_offset_div2);
            bw.write_se(hdr.slice_beta_offset_div2);
        }
    }
}

/// I slice type signaling every slice in the picture is type I (Table 7-6).
const SLICE_TYPE_I_ALL: u32 = 7;

/// Rewrite an externally-encoded IDR slice as our own IDR slice, marking it
/// as a long-term reference (reference A's role).
///
/// Errors if the input payload doesn't match `parse_facts`; per spec §4.3
/// and §7, the caller must drop the picture rather than emit a corrupt NAL.
pub fn rewrite_as_idr(
    rbsp: &[u8],
    write_facts: &ParamSetFacts,
    parse_facts: &ParamSetFacts,
    idr_pic_id: u32,
) -> Result<Vec<u8>, Error> {
    let hdr = parse_idr_slice_header(rbsp, parse_facts)?;

    let mut bw = BitWriter::new();
    bw.write_ue(0); // first_mb_in_slice
    bw.write_ue(SLICE_TYPE_I_ALL);
    bw.write_ue(0); // pic_parameter_set_id
    bw.write_bits(0, write_facts.log2_max_frame_num); // frame_num = 0
    bw.write_ue(idr_pic_id);

    if write_facts.pic_order_cnt_type == 0 {
        bw.write_bits(0, write_facts.log2_max_pic_order_cnt_lsb);
    }

    bw.write_bit(false); // no_output_of_prior_pics_flag
    bw.write_bit(true); // long_term_reference_flag

    write_shared_deblocking_fields(&mut bw, write_facts, &hdr);
    copy_macroblock_layer(&mut bw, rbsp, &hdr)?;

    Ok(bw.into_rbsp())
}

/// Rewrite an externally-encoded IDR slice as a non-IDR I-frame, using
/// MMCO commands to mark it as a long-term reference at index 1 (reference
/// B's role). `frame_num` is this frame's `frame_num` value (1, following
/// reference A's 0).
///
/// Errors if the input payload doesn't match `parse_facts`; per spec §4.3
/// and §7, the caller must drop the picture rather than emit a corrupt NAL.
pub fn rewrite_as_non_idr(
    rbsp: &[u8],
    write_facts: &ParamSetFacts,
    parse_facts: &ParamSetFacts,
    frame_num: u32,
) -> Result<Vec<u8>, Error> {
    let hdr = parse_idr_slice_header(rbsp, parse_facts)?;

    let mut bw = BitWriter::new();
    bw.write_ue(0); // first_mb_in_slice
    bw.write_ue(SLICE_TYPE_I_ALL);
    bw.write_ue(0); // pic_parameter_set_id
    bw.write_bits(frame_num, write_facts.log2_max_frame_num);

    if write_facts.pic_order_cnt_type == 0 {
        bw.write_bits(frame_num * 2, write_facts.log2_max_pic_order_cnt_lsb);
    }

    // dec_ref_pic_marking: adaptive_ref_pic_marking_mode_flag = 1
    bw.write_bit(true);
    bw.write_ue(4); // MMCO 4: max_long_term_frame_idx_plus1
    bw.write_ue(2); // allows indices 0 and 1
    bw.write_ue(6); // MMCO 6: mark current picture as long-term
    bw.write_ue(1); // long_term_frame_idx = 1
    bw.write_ue(0); // MMCO 0: end of list

    write_shared_deblocking_fields(&mut bw, write_facts, &hdr);
    copy_macroblock_layer(&mut bw, rbsp, &hdr)?;

    Ok(bw.into_rbsp())
}
