use easycells_shared::{Packet, SentFrame, VarOp, WireMessage};

/// Frames in `sent` carrying an RPC packet for `method`.
pub fn rpc_sends<'a>(sent: &'a [SentFrame], method: &str) -> Vec<&'a SentFrame> {
    sent.iter()
        .filter(|frame| match frame.message() {
            Ok(WireMessage::Packet(Packet::Rpc { method: sent_method, .. })) => {
                sent_method == method
            }
            _ => false,
        })
        .collect()
}

/// Frames in `sent` carrying a variable packet with `op`.
pub fn var_sends(sent: &[SentFrame], op: VarOp) -> Vec<&SentFrame> {
    sent.iter()
        .filter(|frame| match frame.message() {
            Ok(WireMessage::Packet(Packet::Var { op: sent_op, .. })) => sent_op == op,
            _ => false,
        })
        .collect()
}
