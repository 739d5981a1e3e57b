use super::*;

/// Frames array/map items into wire blocks
///
/// Items are serialized into a scratch buffer (pooled on the
/// [`SerializerConfig`]); whenever [`SerializerConfig::block_length`] items
/// have accumulated, the block is flushed as `[-count, byte_size, items…]`
/// (or `[count, items…]` when size headers are disabled). [`end`](Self::end)
/// flushes the last partial block and writes the zero-count terminator.
///
/// Buffering per block is what makes the byte-size header possible without
/// any writer mode switching: the size is simply known by the time the
/// block is flushed.
pub(super) struct BlockWriter<'r, 'c, 's, W> {
	pub(super) state: &'r mut SerializerState<'c, 's, W>,
	scratch: Vec<u8>,
	items_in_block: usize,
}

impl<'r, 'c, 's, W> BlockWriter<'r, 'c, 's, W>
where
	W: std::io::Write,
{
	pub(super) fn new(state: &'r mut SerializerState<'c, 's, W>) -> Self {
		let scratch = state.config.buffers.block_buffers.pop().unwrap_or_default();
		BlockWriter {
			state,
			scratch,
			items_in_block: 0,
		}
	}

	/// Serialize one item (or one map key-value pair) through `f` into the
	/// current block
	pub(super) fn element<O>(
		&mut self,
		f: impl FnOnce(&mut SerializerState<'_, 's, Vec<u8>>) -> Result<O, SerError>,
	) -> Result<O, SerError> {
		let mut buf_serializer_state = SerializerState {
			writer: std::mem::take(&mut self.scratch),
			config: &mut *self.state.config,
		};
		let res = f(&mut buf_serializer_state);
		self.scratch = buf_serializer_state.into_writer();
		let out = res?;
		self.items_in_block += 1;
		if self.items_in_block >= self.state.config.block_length.max(1) {
			self.flush_block()?;
		}
		Ok(out)
	}

	fn flush_block(&mut self) -> Result<(), SerError> {
		if self.items_in_block == 0 {
			return Ok(());
		}
		let count: i64 = self
			.items_in_block
			.try_into()
			.map_err(|_| SerError::new("Array or map block len overflows i64"))?;
		if self.state.config.write_block_size_header {
			let byte_size: i64 = self
				.scratch
				.len()
				.try_into()
				.map_err(|_| SerError::new("Array or map block byte size overflows i64"))?;
			self.state.writer.write_varint(-count).map_err(SerError::io)?;
			self.state
				.writer
				.write_varint(byte_size)
				.map_err(SerError::io)?;
		} else {
			self.state.writer.write_varint(count).map_err(SerError::io)?;
		}
		self.state
			.writer
			.write_all(&self.scratch)
			.map_err(SerError::io)?;
		self.scratch.clear();
		self.items_in_block = 0;
		Ok(())
	}

	/// Flush the last block and advertise end (zero-sized block)
	pub(super) fn end(&mut self) -> Result<(), SerError> {
		self.flush_block()?;
		self.state.writer.write_varint(0i32).map_err(SerError::io)?;
		Ok(())
	}
}

impl<W> Drop for BlockWriter<'_, '_, '_, W> {
	fn drop(&mut self) {
		if self.scratch.capacity() > 0 {
			let mut scratch = std::mem::take(&mut self.scratch);
			scratch.clear();
			self.state.config.buffers.block_buffers.push(scratch);
		}
	}
}
