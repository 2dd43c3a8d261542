// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Top-level driver: parses the two externally-encoded reference pictures,
//! emits the stream header (SPS, PPS, rewritten reference A and B), and
//! synthesizes scroll P-frames across a caller-supplied sequence of
//! offsets.

use alloc::vec::Vec;

use crate::nal::{self, NalRefIdc, NalUnitType, NalWriter};
use crate::paramset::{self, ParamSetFacts};
use crate::slice_rewriter;
use crate::synthesizer::{FrameCounter, ScrollFrameSynthesizer};
use crate::Error;

/// `frame_num` assigned to the rewritten reference A and reference B
/// frames; P-frames continue on from here.
const REF_A_FRAME_NUM: u32 = 0;
const REF_B_FRAME_NUM: u32 = 1;

fn parse_facts_from_reference(sps_rbsp: &[u8], pps_rbsp: &[u8]) -> Result<(ParamSetFacts, u32, u32), Error> {
    let (width, height, log2_max_frame_num, pic_order_cnt_type, log2_max_pic_order_cnt_lsb) =
        paramset::parse_sps(sps_rbsp)?;
    let (num_ref_idx_l0_default_minus1, deblocking_filter_control_present_flag) =
        paramset::parse_pps(pps_rbsp)?;

    Ok((
        ParamSetFacts {
            width,
            height,
            log2_max_frame_num,
            pic_order_cnt_type,
            log2_max_pic_order_cnt_lsb,
            num_ref_idx_l0_default_minus1,
            deblocking_filter_control_present_flag,
        },
        width,
        height,
    ))
}

/// Drives the full encode: owns the output Annex-B buffer, the facts
/// describing how the *external* encoder wrote reference A and B (used
/// only to parse their slice headers), the facts this crate's own SPS/PPS
/// establish (used to write every header from here on), and the scroll
/// frame synthesizer.
pub struct ScrollEncoder {
    nal_writer: NalWriter,
    write_facts: ParamSetFacts,
    synthesizer: ScrollFrameSynthesizer,
}

impl ScrollEncoder {
    /// Parse the two reference pictures (each a complete Annex-B stream
    /// containing one SPS, one PPS and one IDR slice), verify their
    /// dimensions agree, and write the stream header: SPS, PPS, reference A
    /// rewritten as a long-term-reference IDR, reference B rewritten as a
    /// long-term-reference non-IDR I-frame.
    pub fn new(ref_a: &[u8], ref_b: &[u8]) -> Result<Self, Error> {
        let ref_a = nal::parse_reference_picture(ref_a)?;
        let ref_b = nal::parse_reference_picture(ref_b)?;

        let (parse_facts, width, height) = parse_facts_from_reference(&ref_a.sps_rbsp, &ref_a.pps_rbsp)?;
        let (_, width_b, height_b) = parse_facts_from_reference(&ref_b.sps_rbsp, &ref_b.pps_rbsp)?;

        if width != width_b || height != height_b {
            return Err(Error::dimension_mismatch(width, height, width_b, height_b));
        }

        let write_facts =
            ParamSetFacts::for_own_output(width, height, parse_facts.deblocking_filter_control_present_flag);

        let mut nal_writer = NalWriter::new();
        nal_writer.write_unit(
            NalRefIdc::Highest,
            NalUnitType::SequenceParameterSet,
            &paramset::emit_sps(width, height),
        );
        nal_writer.write_unit(
            NalRefIdc::Highest,
            NalUnitType::PictureParameterSet,
            &paramset::emit_pps(write_facts.deblocking_filter_control_present_flag),
        );

        let idr_rbsp =
            slice_rewriter::rewrite_as_idr(&ref_a.idr_rbsp, &write_facts, &parse_facts, REF_A_FRAME_NUM)?;
        nal_writer.write_unit(NalRefIdc::Highest, NalUnitType::CodedSliceOfAnIdrPicture, &idr_rbsp);

        let non_idr_rbsp = slice_rewriter::rewrite_as_non_idr(
            &ref_b.idr_rbsp,
            &write_facts,
            &parse_facts,
            REF_B_FRAME_NUM,
        )?;
        nal_writer.write_unit(
            NalRefIdc::Highest,
            NalUnitType::CodedSliceOfANonIdrPicture,
            &non_idr_rbsp,
        );

        let mut synthesizer = ScrollFrameSynthesizer::new(write_facts);
        synthesizer.set_frame_counter(FrameCounter::starting_at(REF_B_FRAME_NUM + 1));

        Ok(Self {
            nal_writer,
            write_facts,
            synthesizer,
        })
    }

    pub fn width(&self) -> u32 {
        self.write_facts.width
    }

    pub fn height(&self) -> u32 {
        self.write_facts.height
    }

    /// Encode a scroll P-frame at `offset_px`, minting a waypoint long-term
    /// reference first if this offset requires one.
    pub fn write_scroll_frame(&mut self, offset_px: i32) -> Result<(), Error> {
        if self.synthesizer.needs_waypoint(offset_px) {
            let rbsp = self.synthesizer.write_waypoint_frame(offset_px)?;
            self.nal_writer
                .write_unit(NalRefIdc::High, NalUnitType::CodedSliceOfANonIdrPicture, &rbsp);
        }

        let rbsp = self.synthesizer.write_scroll_frame(offset_px);
        self.nal_writer
            .write_unit(NalRefIdc::None, NalUnitType::CodedSliceOfANonIdrPicture, &rbsp);
        Ok(())
    }

    /// Encode `frame_count` scroll frames stepping by `speed_px` per frame,
    /// clamped to `[0, height]`; once the scroll reaches height the stream
    /// holds on full reference B for any remaining frames.
    pub fn write_scroll_sequence(&mut self, frame_count: u32, speed_px: u32) -> Result<(), Error> {
        let height = self.height() as i64;
        for i in 0..frame_count {
            let offset = (i as i64 * speed_px as i64).min(height) as i32;
            self.write_scroll_frame(offset)?;
        }
        Ok(())
    }

    /// Consume the encoder, returning the complete Annex-B elementary
    /// stream assembled so far.
    pub fn into_bytes(self) -> Vec<u8> {
        self.nal_writer.into_bytes()
    }
}
